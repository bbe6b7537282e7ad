//! CLI command implementations.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use interact::ScenarioRunner;
use interact::exit_codes;
use interact::io::config::{HarnessConfig, load_config};

use crate::config::{apply_command_flag, apply_suite_config};
use crate::prelude::run_prelude;
use crate::report::{ReportFile, file_sha256, print_result, print_summary, write_report};
use crate::suite::SuiteFile;

/// Config file picked up from the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "modeltest.toml";

/// Options of `modeltest run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub suite: PathBuf,
    pub config: Option<PathBuf>,
    pub command: Option<String>,
    pub filter: Option<String>,
    pub report: Option<PathBuf>,
    pub fail_fast: bool,
    pub skip_prelude: bool,
}

/// Print the scenario names of a suite, one per line.
pub fn list_scenarios(suite_path: &Path) -> Result<()> {
    let suite = SuiteFile::load(suite_path)?;
    let mut stdout = io::stdout().lock();
    for scenario in &suite.scenarios {
        writeln!(stdout, "{} ({} steps)", scenario.name, scenario.steps.len())
            .context("write scenario list")?;
    }
    Ok(())
}

/// Run a suite and return the process exit code.
pub fn run_suite(args: &RunArgs) -> Result<i32> {
    let suite = SuiteFile::load(&args.suite).context("load suite")?;
    let cfg = resolve_config(args, &suite)?;
    debug!(suite = %suite.suite.name, command = ?cfg.command, "suite loaded");

    let workdir = match &cfg.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let mut stdout = io::stdout().lock();

    if let Some(prelude) = &suite.prelude {
        if args.skip_prelude {
            info!("prelude skipped");
        } else {
            run_prelude(prelude, Some(workdir.as_path()), cfg.exit_timeout(), &mut stdout)
                .context("prelude")?;
        }
    }

    let scenarios = suite.scenarios(&workdir)?;
    let interactor = cfg.interactor()?;
    let command = interactor.spawn.command.to_string();
    let runner = ScenarioRunner::new(interactor)
        .with_prompt(cfg.prompt.clone())
        .with_filter(args.filter.clone())
        .with_fail_fast(args.fail_fast);
    if !scenarios.iter().any(|scenario| runner.selects(scenario)) {
        bail!(
            "no scenario in {} matches filter {:?}",
            args.suite.display(),
            args.filter.as_deref().unwrap_or_default()
        );
    }

    info!(suite = %suite.suite.name, scenarios = scenarios.len(), %command, "run started");
    let started_at = Utc::now();
    let report = runner.run_with(&scenarios, |result| {
        if let Err(err) = print_result(&mut stdout, result) {
            warn!(error = %err, "failed to print scenario result");
        }
    })?;
    let finished_at = Utc::now();
    print_summary(&mut stdout, &report).context("write summary")?;

    if let Some(path) = &args.report {
        let suite_hash = file_sha256(&args.suite)?;
        let file = ReportFile::new(
            &suite.suite.name,
            suite_hash,
            command,
            started_at,
            finished_at,
            &report,
        );
        write_report(path, &file)?;
        debug!(report = %path.display(), "report written");
    }

    Ok(if report.all_passed() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

/// Base config file, then suite overrides, then `--command`.
fn resolve_config(args: &RunArgs, suite: &SuiteFile) -> Result<HarnessConfig> {
    let base = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config {} not found", path.display());
            }
            load_config(path)?
        }
        None => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    let cfg = apply_suite_config(base, &suite.config)?;
    apply_command_flag(cfg, args.command.as_deref())
}
