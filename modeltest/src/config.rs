//! Harness configuration merging.
//!
//! Layers suite overrides and command-line flags over the base config file.

use anyhow::Result;
use interact::CommandLine;
use interact::io::config::HarnessConfig;

use crate::suite::SuiteConfig;

/// Apply suite configuration overrides to the base harness config.
pub fn apply_suite_config(mut base: HarnessConfig, overrides: &SuiteConfig) -> Result<HarnessConfig> {
    if let Some(command) = &overrides.command {
        base.command = command.clone();
    }
    if let Some(stderr) = overrides.stderr {
        base.stderr = stderr;
    }
    if let Some(prompt) = &overrides.prompt {
        base.prompt = prompt.clone();
    }
    if let Some(exit_timeout_ms) = overrides.exit_timeout_ms {
        base.exit_timeout_ms = exit_timeout_ms;
    }
    base.validate()?;
    Ok(base)
}

/// Replace the program under test with a shell-style command line.
pub fn apply_command_flag(mut base: HarnessConfig, command: Option<&str>) -> Result<HarnessConfig> {
    if let Some(line) = command {
        base.command = CommandLine::parse(line)?.argv();
    }
    base.validate()?;
    Ok(base)
}
