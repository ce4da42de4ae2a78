//! Word error rate scoring and the pass/fail decision built on it.

use super::normalize::normalize_text;
use crate::defaults;
use serde::{Deserialize, Serialize};

/// Outcome of scoring one transcript against its reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    Pass { score: f64 },
    Fail { score: f64 },
}

impl GateVerdict {
    /// The rounded WER the verdict was decided on.
    pub fn score(&self) -> f64 {
        match self {
            GateVerdict::Pass { score } | GateVerdict::Fail { score } => *score,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, GateVerdict::Pass { .. })
    }
}

/// Accepts transcripts whose WER is at or below `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    threshold: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(defaults::WER_THRESHOLD)
    }
}

impl QualityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, reference: &str, hypothesis: &str) -> GateVerdict {
        let score = word_error_rate(reference, hypothesis);
        if score <= self.threshold {
            GateVerdict::Pass { score }
        } else {
            GateVerdict::Fail { score }
        }
    }
}

/// Word error rate of `hypothesis` against `reference`, rounded to 3 decimals.
///
/// Both texts are normalized first. An empty reference scores 0.0 against an
/// empty hypothesis and 1.0 against anything else. Otherwise the score is
/// `(S + D + I) / N` and can exceed 1.0 when the hypothesis has many
/// insertions.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let reference = normalize_text(reference);
    let hypothesis = normalize_text(hypothesis);

    let reference_words: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis_words: Vec<&str> = hypothesis.split_whitespace().collect();

    if reference_words.is_empty() {
        return if hypothesis_words.is_empty() { 0.0 } else { 1.0 };
    }

    let distance = levenshtein_words(&reference_words, &hypothesis_words);
    round3(distance as f64 / reference_words.len() as f64)
}

/// Round to 3 decimal places, the precision every score and timing is stored at.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Edit distance over words (substitutions, deletions, insertions).
fn levenshtein_words(a: &[&str], b: &[&str]) -> usize {
    let m = a.len();
    let n = b.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev = (0..=n).collect::<Vec<usize>>();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
