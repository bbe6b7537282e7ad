//! Suite file parsing and validation.
//!
//! Suites are TOML files holding the scenarios for one program under test.
//! See `modeltest/scenarios/` for examples.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use interact::core::predicate::CHANGED_PREFIX;
use interact::{Scenario, StderrPolicy, Step, changed_check};

/// A parsed suite file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SuiteFile {
    pub suite: SuiteMeta,
    #[serde(default)]
    pub config: SuiteConfig,
    pub prelude: Option<PreludeSpec>,
    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SuiteMeta {
    pub name: String,
    pub description: Option<String>,
}

/// Harness overrides carried by the suite.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SuiteConfig {
    pub command: Option<Vec<String>>,
    pub stderr: Option<StderrPolicy>,
    pub prompt: Option<String>,
    pub exit_timeout_ms: Option<u64>,
}

/// Command run once before the scenarios, typically a build.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PreludeSpec {
    pub command: Vec<String>,
    /// First output line meaning "nothing to report"; anything else is shown.
    pub quiet_line: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// One step: either a `command` (with at most one expectation) or a single
/// file action.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub command: Option<String>,
    /// Literal the response line must start with.
    pub expect: Option<String>,
    /// Cells the response must report as changed, in any order.
    pub changed: Option<Vec<String>>,
    /// Prefix of the changed report (default `"Changed: "`).
    pub prefix: Option<String>,
    pub rename: Option<RenameSpec>,
    pub remove: Option<PathBuf>,
    pub write: Option<WriteSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RenameSpec {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WriteSpec {
    pub path: PathBuf,
    pub contents: String,
}

impl SuiteFile {
    /// Load and validate a suite file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read suite {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load suite {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let suite: SuiteFile = toml::from_str(contents).context("parse suite")?;
        suite.validate()?;
        Ok(suite)
    }

    /// Build runnable scenarios; file actions resolve against `workdir`.
    pub fn scenarios(&self, workdir: &Path) -> Result<Vec<Scenario>> {
        self.scenarios
            .iter()
            .map(|spec| {
                let steps = spec
                    .steps
                    .iter()
                    .map(|step| step.to_step(workdir))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Scenario::with_steps(spec.name.clone(), steps))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.suite.name.trim().is_empty() {
            bail!("suite.name must be non-empty");
        }
        if let Some(command) = &self.config.command
            && (command.is_empty() || command[0].trim().is_empty())
        {
            bail!("config.command must be a non-empty array");
        }
        if let Some(prompt) = &self.config.prompt
            && prompt.is_empty()
        {
            bail!("config.prompt must be non-empty");
        }
        if self.config.exit_timeout_ms == Some(0) {
            bail!("config.exit_timeout_ms must be > 0");
        }
        if let Some(prelude) = &self.prelude
            && (prelude.command.is_empty() || prelude.command[0].trim().is_empty())
        {
            bail!("prelude.command must be a non-empty array");
        }
        if self.scenarios.is_empty() {
            bail!("scenario must be a non-empty array");
        }
        let mut names = BTreeSet::new();
        for (index, scenario) in self.scenarios.iter().enumerate() {
            if scenario.name.trim().is_empty() {
                bail!("scenario[{index}].name must be non-empty");
            }
            if !names.insert(scenario.name.as_str()) {
                bail!("duplicate scenario name {:?}", scenario.name);
            }
            for (step_index, step) in scenario.steps.iter().enumerate() {
                step.validate().with_context(|| {
                    format!("scenario {:?} step {} invalid", scenario.name, step_index + 1)
                })?;
            }
        }
        Ok(())
    }
}

impl StepSpec {
    fn validate(&self) -> Result<()> {
        let kinds = [
            self.command.is_some(),
            self.rename.is_some(),
            self.remove.is_some(),
            self.write.is_some(),
        ];
        if kinds.iter().filter(|present| **present).count() != 1 {
            bail!("step needs exactly one of command, rename, remove, write");
        }
        if self.command.is_none()
            && (self.expect.is_some() || self.changed.is_some() || self.prefix.is_some())
        {
            bail!("expect, changed and prefix only apply to command steps");
        }
        if self.expect.is_some() && self.changed.is_some() {
            bail!("expect and changed are mutually exclusive");
        }
        if self.prefix.is_some() && self.changed.is_none() {
            bail!("prefix requires changed");
        }
        if let Some(command) = &self.command
            && command.contains('\n')
        {
            bail!("command must be a single line");
        }
        if let Some(changed) = &self.changed
            && changed.iter().any(|cell| cell.trim().is_empty())
        {
            bail!("changed entries must be non-empty");
        }
        if let Some(rename) = &self.rename {
            validate_relative(&rename.from, "rename.from")?;
            validate_relative(&rename.to, "rename.to")?;
        }
        if let Some(path) = &self.remove {
            validate_relative(path, "remove")?;
        }
        if let Some(write) = &self.write {
            validate_relative(&write.path, "write.path")?;
        }
        Ok(())
    }

    fn to_step(&self, workdir: &Path) -> Result<Step> {
        if let Some(command) = &self.command {
            let step = match (&self.expect, &self.changed) {
                (Some(expect), _) => Step::exchange(command.clone(), expect.clone()),
                (None, Some(changed)) => {
                    let prefix = self.prefix.as_deref().unwrap_or(CHANGED_PREFIX);
                    Step::check(command.clone(), changed_check(prefix, changed.clone()))
                }
                (None, None) => Step::send(command.clone()),
            };
            return Ok(step);
        }
        if let Some(rename) = &self.rename {
            let from = workdir.join(&rename.from);
            let to = workdir.join(&rename.to);
            let label = format!("rename {} {}", rename.from.display(), rename.to.display());
            return Ok(Step::action(label, move || {
                fs::rename(&from, &to)
                    .with_context(|| format!("rename {} to {}", from.display(), to.display()))
            }));
        }
        if let Some(path) = &self.remove {
            let target = workdir.join(path);
            return Ok(Step::action(format!("remove {}", path.display()), move || {
                fs::remove_file(&target).with_context(|| format!("remove {}", target.display()))
            }));
        }
        let Some(write) = &self.write else {
            bail!("step needs exactly one of command, rename, remove, write");
        };
        let target = workdir.join(&write.path);
        let contents = write.contents.clone();
        Ok(Step::action(format!("write {}", write.path.display()), move || {
            fs::write(&target, &contents).with_context(|| format!("write {}", target.display()))
        }))
    }
}

fn validate_relative(path: &Path, field: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("{field} must be non-empty");
    }
    if !path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
    {
        bail!("{field} must be a relative path without '..'");
    }
    Ok(())
}
