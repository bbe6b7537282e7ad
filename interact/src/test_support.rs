//! Test-only helpers: in-memory readers and a scripted REPL fixture.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::types::StderrPolicy;
use crate::interactor::InteractorConfig;
use crate::io::process::CommandLine;

/// Line-oriented fixture speaking the prompt protocol.
///
/// `$1` names the store file used by `put`/`get`, relative to the working
/// directory.
pub const REPL_SCRIPT: &str = r#"store="${1:-store.txt}"
while printf '> ' && IFS= read -r line; do
  case "$line" in
    "ca 0 0") printf 'A1\n' ;;
    "ca A1") printf 'row=0 column=0\n' ;;
    "change B1 42") printf 'Changed: B1 A2\n' ;;
    "echo "*) printf '%s\n' "${line#echo }" ;;
    "err "*) printf '%s\n' "${line#err }" >&2 ;;
    "put "*) printf '%s\n' "${line#put }" > "$store"; printf 'ok\n' ;;
    get) if [ -f "$store" ]; then cat "$store"; else printf 'missing\n'; fi ;;
    silent) ;;
    crash) exit 3 ;;
    quit) exit 0 ;;
    *) printf 'unknown command: %s\n' "$line" ;;
  esac
done
"#;

pub const STORE_FILE: &str = "store.txt";

/// Argument vector running [`REPL_SCRIPT`] through `sh`.
pub fn repl_argv() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        REPL_SCRIPT.to_string(),
        "repl-fixture".to_string(),
        STORE_FILE.to_string(),
    ]
}

/// Interactor config running `script` through `sh -c`.
pub fn sh_config(script: &str) -> InteractorConfig {
    InteractorConfig::new(CommandLine::new("sh").arg("-c").arg(script))
}

/// Temporary working directory for the REPL fixture.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create fixture dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join(STORE_FILE)
    }

    /// Interactor config for the REPL fixture, run inside the fixture dir.
    pub fn repl(&self, stderr: StderrPolicy) -> InteractorConfig {
        let argv = repl_argv();
        let mut config = InteractorConfig::new(CommandLine::new(&argv[0]).args(&argv[1..]));
        config.spawn.stderr = stderr;
        config.spawn.current_dir = Some(self.dir.path().to_path_buf());
        config
    }
}

/// Reader returning predefined chunks, one per `read` call at most.
#[derive(Debug, Default)]
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
    reads: usize,
}

impl ChunkedReader {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
            reads: 0,
        }
    }

    /// Number of `read` calls made so far, including the final EOF read.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        let Some(front) = self.chunks.front_mut() else {
            return Ok(0);
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() {
            self.chunks.pop_front();
        }
        Ok(n)
    }
}

/// Reader whose every `read` fails.
#[derive(Debug, Default)]
pub struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("pipe failure"))
    }
}
