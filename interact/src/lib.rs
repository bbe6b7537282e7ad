//! Scripted interaction with line-oriented command-line programs.
//!
//! The harness spawns a program, waits for its prompt, sends commands and
//! checks the responses against literals or predicates. The crate is split
//! the same way throughout:
//!
//! - **[`core`]**: Pure logic (prefix/line matching, predicates, the step
//!   model). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting pieces (child processes, pipe buffering,
//!   transcripts, config files).
//!
//! [`interactor`] composes a process with its stream buffers, and [`runner`]
//! drives scenarios through fresh interactors with per-scenario isolation.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod interactor;
pub mod io;
pub mod logging;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::predicate::{changed, changed_check, set_equal};
pub use crate::core::scenario::{Expectation, LinePredicate, Scenario, Step};
pub use crate::core::types::{StderrPolicy, Stream};
pub use crate::error::HarnessError;
pub use crate::interactor::{Interactor, InteractorConfig};
pub use crate::io::process::CommandLine;
pub use crate::runner::{RunReport, ScenarioResult, ScenarioRunner, ScenarioStatus};
