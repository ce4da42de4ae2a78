//! Transcript quality scoring.

pub mod gate;
pub mod normalize;

pub use gate::{GateVerdict, QualityGate, word_error_rate};
pub use normalize::normalize_text;
