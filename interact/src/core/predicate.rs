//! Response line predicates.

use crate::core::scenario::LinePredicate;

/// Prefix of the spreadsheet CLI's change report.
pub const CHANGED_PREFIX: &str = "Changed: ";

/// Multiset equality: same length and same sorted contents.
pub fn set_equal<A, B>(actual: &[A], expected: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    if actual.len() != expected.len() {
        return false;
    }
    let mut left: Vec<&str> = actual.iter().map(AsRef::as_ref).collect();
    let mut right: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

/// Check that `line` is `prefix` followed by whitespace-separated tokens that
/// equal `expected` as an unordered multiset.
pub fn matches_token_set<S: AsRef<str>>(line: &str, prefix: &str, expected: &[S]) -> bool {
    match line.strip_prefix(prefix) {
        Some(rest) => {
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            set_equal(&tokens, expected)
        }
        None => false,
    }
}

/// Predicate accepting `<prefix><tokens>` where the tokens equal `expected`
/// in any order.
pub fn changed_check(prefix: impl Into<String>, expected: Vec<String>) -> LinePredicate {
    let prefix = prefix.into();
    let label = format!("{prefix}{{{}}}", expected.join(", "));
    LinePredicate::new(label, move |line| {
        matches_token_set(line, &prefix, &expected)
    })
}

/// [`changed_check`] with the default `"Changed: "` prefix.
pub fn changed(expected: &[&str]) -> LinePredicate {
    changed_check(
        CHANGED_PREFIX,
        expected.iter().map(|s| (*s).to_string()).collect(),
    )
}
