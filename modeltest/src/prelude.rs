use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use interact::{CommandLine, HarnessError, Interactor, InteractorConfig, StderrPolicy};

use crate::suite::PreludeSpec;

/// Run the prelude with stderr merged into stdout.
///
/// The first output line is compared with `quiet_line`; when it differs (or
/// no quiet line is set) that line and the remaining output are copied to
/// `out`. Output is drained either way and the command must exit 0.
#[instrument(skip_all, fields(command = ?prelude.command))]
pub fn run_prelude<W: Write>(
    prelude: &PreludeSpec,
    workdir: Option<&Path>,
    exit_timeout: Duration,
    out: &mut W,
) -> Result<()> {
    let command = CommandLine::from_argv(&prelude.command)?;
    let mut config = InteractorConfig::new(command.clone());
    config.spawn.stderr = StderrPolicy::Merged;
    config.spawn.current_dir = workdir.map(Path::to_path_buf);
    config.exit_timeout = exit_timeout;

    let mut proc =
        Interactor::spawn(&config).with_context(|| format!("run prelude {command}"))?;
    let first = match proc.getline("\n") {
        Ok(line) => Some(line),
        Err(HarnessError::EndOfStream { .. }) => None,
        Err(err) => return Err(err).with_context(|| format!("read prelude {command}")),
    };

    let quiet = match (&first, &prelude.quiet_line) {
        (None, _) => true,
        (Some(line), Some(quiet_line)) => line == quiet_line,
        (Some(_), None) => false,
    };
    let drained = if quiet {
        debug!("prelude quiet");
        proc.pipe(&mut io::sink())
    } else {
        if let Some(line) = &first {
            writeln!(out, "{line}").context("write prelude output")?;
        }
        proc.pipe(out)
    };
    drained.with_context(|| format!("prelude {command}"))?;
    info!("prelude finished");
    Ok(())
}
