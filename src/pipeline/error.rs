//! Reporting for failures that drop work without stopping the run.

use crate::error::ErrorKind;
use crate::pipeline::record::Stage;
use std::fmt;

/// Why a unit of work was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineFailure {
    /// A dataset item could not be read or segmented. None of its chunks run.
    Item { kind: ErrorKind, message: String },
    /// A record stage returned an error or panicked.
    Record { stage: Stage, cause: String },
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineFailure::Item { kind, message } => {
                write!(f, "item skipped ({:?}): {}", kind, message)
            }
            PipelineFailure::Record { stage, cause } => {
                write!(f, "record failed after {}: {}", stage, cause)
            }
        }
    }
}

/// Trait for reporting dropped work.
pub trait ErrorReporter: Send + Sync {
    /// `source` is the item or record label.
    fn report(&self, source: &str, failure: &PipelineFailure);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, source: &str, failure: &PipelineFailure) {
        tracing::warn!(source, "{}", failure);
    }
}

/// Best-effort message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}
