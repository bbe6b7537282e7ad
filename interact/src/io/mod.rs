//! Side-effecting helpers: child processes, pipes, transcripts, config files.

pub mod config;
pub mod process;
pub mod stream;
pub mod transcript;
