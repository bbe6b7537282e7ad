//! Scenario-driven acceptance tests for interactive command-line programs.
//!
//! Loads a TOML suite, optionally runs its prelude (usually a build), then
//! drives every scenario against a fresh instance of the program under test.

mod cli;
mod config;
mod prelude;
mod report;
mod suite;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use interact::exit_codes;

use crate::cli::RunArgs;

#[derive(Parser)]
#[command(
    name = "modeltest",
    version,
    about = "Scripted acceptance tests for prompt-driven CLI programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the scenario names of a suite.
    List {
        #[arg(long)]
        suite: PathBuf,
    },
    /// Run the scenarios of a suite.
    Run {
        #[arg(long)]
        suite: PathBuf,
        /// Harness config file (default: `modeltest.toml` if present).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Program under test as a shell-style command line.
        #[arg(long)]
        command: Option<String>,
        /// Only run scenarios whose name contains this text.
        #[arg(long)]
        filter: Option<String>,
        /// Write a JSON report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Stop after the first failed scenario.
        #[arg(long)]
        fail_fast: bool,
        /// Do not run the suite's prelude command.
        #[arg(long)]
        skip_prelude: bool,
    },
}

fn main() {
    interact::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::List { suite } => {
            cli::list_scenarios(&suite)?;
            Ok(exit_codes::OK)
        }
        Command::Run {
            suite,
            config,
            command,
            filter,
            report,
            fail_fast,
            skip_prelude,
        } => cli::run_suite(&RunArgs {
            suite,
            config,
            command,
            filter,
            report,
            fail_fast,
            skip_prelude,
        }),
    }
}
