//! Append-only record of everything exchanged with a child process.
//!
//! The transcript is only rendered when a scenario fails; on success it is
//! dropped with its interactor.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::types::Stream;

/// Direction of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Stdin,
    Stdout,
    Stderr,
}

impl Direction {
    fn tag(self) -> &'static str {
        match self {
            Direction::Stdin => "stdin ",
            Direction::Stdout => "stdout",
            Direction::Stderr => "stderr",
        }
    }
}

impl From<Stream> for Direction {
    fn from(stream: Stream) -> Self {
        match stream {
            Stream::Stdout => Direction::Stdout,
            Stream::Stderr => Direction::Stderr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub direction: Direction,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes`, coalescing with the previous entry when the direction
    /// is unchanged.
    pub fn record(&mut self, direction: Direction, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.entries.last_mut() {
            Some(last) if last.direction == direction => last.bytes.extend_from_slice(bytes),
            _ => self.entries.push(Entry {
                direction,
                bytes: bytes.to_vec(),
            }),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All bytes recorded for one direction, in arrival order.
    pub fn bytes_for(&self, direction: Direction) -> Vec<u8> {
        self.entries
            .iter()
            .filter(|entry| entry.direction == direction)
            .flat_map(|entry| entry.bytes.iter().copied())
            .collect()
    }

    /// Render one line per entry: `[stdout] "A1\n> "`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let text = String::from_utf8_lossy(&entry.bytes);
            let _ = writeln!(out, "[{}] {:?}", entry.direction.tag(), text);
        }
        out
    }
}
