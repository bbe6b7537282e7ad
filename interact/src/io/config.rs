//! Harness configuration, usually stored as `modeltest.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::StderrPolicy;
use crate::interactor::InteractorConfig;
use crate::io::process::{CommandLine, SpawnOptions};
use crate::io::stream::DEFAULT_CHUNK_SIZE;

/// Prompt the tested program prints before reading each command.
pub const DEFAULT_PROMPT: &str = "> ";

/// Harness configuration (TOML).
///
/// Missing fields default to values suited for the spreadsheet CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Program under test and its arguments (e.g. `["./main"]`).
    pub command: Vec<String>,

    /// Where the program's stderr goes: `merged`, `piped` or `inherit`.
    pub stderr: StderrPolicy,

    /// Literal prompt printed before each command.
    pub prompt: String,

    /// Bytes requested per pipe read.
    pub chunk_size: usize,

    /// Bound on waiting for the program to exit after its output is drained.
    pub exit_timeout_ms: u64,

    /// Working directory for the program and for file actions.
    pub workdir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            command: vec!["./main".to_string()],
            stderr: StderrPolicy::Inherit,
            prompt: DEFAULT_PROMPT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            exit_timeout_ms: 5_000,
            workdir: None,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(anyhow!("command must be a non-empty array"));
        }
        if self.prompt.is_empty() {
            return Err(anyhow!("prompt must be non-empty"));
        }
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be > 0"));
        }
        if self.exit_timeout_ms == 0 {
            return Err(anyhow!("exit_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    /// Interactor settings for the program under test.
    pub fn interactor(&self) -> Result<InteractorConfig> {
        self.validate()?;
        let command = CommandLine::from_argv(&self.command)?;
        let mut spawn = SpawnOptions::new(command);
        spawn.stderr = self.stderr;
        spawn.current_dir = self.workdir.clone();
        Ok(InteractorConfig {
            spawn,
            chunk_size: self.chunk_size,
            exit_timeout: self.exit_timeout(),
        })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
