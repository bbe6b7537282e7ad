//! Incremental search helpers for buffered stream matching.
//!
//! Searches resume from the last offset known not to contain the needle, so
//! total work stays linear in the number of bytes received.

/// Classification of a buffer against an expected literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixStatus {
    /// Buffer is shorter than the literal and matches it so far.
    Partial,
    /// Buffer starts with the whole literal.
    Complete,
    /// Buffer can no longer become the literal.
    Diverged,
}

/// Find `needle` in `haystack`, starting at byte offset `from`.
///
/// Returns the absolute offset of the first match. An empty needle matches at
/// `from`.
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// Offset from which the next search must resume after a miss on a buffer of
/// `searched_len` bytes.
///
/// Steps back `needle_len - 1` bytes so a needle split across two reads is
/// still found.
pub fn resume_offset(searched_len: usize, needle_len: usize) -> usize {
    searched_len.saturating_sub(needle_len.saturating_sub(1))
}

pub fn prefix_status(buffer: &[u8], literal: &[u8]) -> PrefixStatus {
    if buffer.len() >= literal.len() {
        if buffer.starts_with(literal) {
            PrefixStatus::Complete
        } else {
            PrefixStatus::Diverged
        }
    } else if literal.starts_with(buffer) {
        PrefixStatus::Partial
    } else {
        PrefixStatus::Diverged
    }
}
