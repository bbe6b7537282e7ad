//! Failure taxonomy for process interaction.
//!
//! Every variant except [`HarnessError::ProcessExit`] is a step-level failure:
//! the scenario runner records it against the failing step and moves on to the
//! next scenario. A non-zero exit after a completed drain is terminal for the
//! whole run.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::types::Stream;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("write to stdin failed: {0}")]
    Write(#[source] io::Error),

    #[error("stdin of process closed unexpectedly")]
    BrokenPipe,

    #[error("could not read from {stream} of process: {source}")]
    Read {
        stream: Stream,
        #[source]
        source: io::Error,
    },

    #[error("EOF on read from {stream} of process")]
    EndOfStream { stream: Stream },

    #[error("expected {expected:?} on {stream} of process, found {actual:?}")]
    Mismatch {
        stream: Stream,
        expected: String,
        actual: String,
    },

    #[error("predicate {label} returned false on {line:?}")]
    PredicateFailed { label: String, line: String },

    #[error("{program} still running after {timeout:?}, killed")]
    ProcessTimeout { program: String, timeout: Duration },

    #[error("{program} exited with status {}", describe_code(.code))]
    ProcessExit { program: String, code: Option<i32> },

    #[error("wait for {program} failed: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{stream} of process is not piped")]
    StreamUnavailable { stream: Stream },

    #[error("write to output sink failed: {0}")]
    Sink(#[source] io::Error),

    #[error("action {label} failed: {message}")]
    Action { label: String, message: String },
}

impl HarnessError {
    /// Whether this failure ends the whole run instead of a single scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::ProcessExit { .. })
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}
