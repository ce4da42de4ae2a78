//! Canonical text form used for comparing references and transcripts.

use once_cell::sync::Lazy;
use regex::Regex;

// SAFETY: hardcoded pattern, verified by tests
#[allow(clippy::expect_used)]
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

// SAFETY: hardcoded pattern, verified by tests
#[allow(clippy::expect_used)]
static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Lowercase, strip everything that is not a word character or whitespace,
/// collapse whitespace runs and trim.
///
/// Apostrophes are stripped too, so "don't" and "dont" compare equal.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}
