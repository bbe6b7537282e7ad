//! Shared types for stream selection and spawn policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output stream of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the child's stderr goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrPolicy {
    /// Joined into the stdout pipe, in write order.
    Merged,
    /// Separate pipe, readable through [`Stream::Stderr`].
    Piped,
    /// Passed through to the harness's own stderr.
    #[default]
    Inherit,
}

/// Lifecycle of one scenario execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    NotStarted,
    Running,
    Passed,
    Failed,
}
