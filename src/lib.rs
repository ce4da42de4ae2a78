//! speech-curator - quality-gated speech dataset curation
//!
//! Segments utterances into 5-15 s chunks, transcribes them, scores the
//! transcript against the reference text, and persists only chunks whose
//! word error rate clears the quality gate.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod quality;
pub mod segmenter;
pub mod sink;
pub mod stt;

// Composition root - needs everything
pub mod app;

// Core traits (source → process → sink)
pub use audio::SpeechDetector;
pub use sink::ChunkSink;
pub use stt::Transcriber;

// Pipeline
pub use pipeline::{BatchScheduler, PipelineExecutor, RunSummary};
pub use quality::{GateVerdict, QualityGate};
pub use segmenter::{Chunk, Segmenter};

// Error handling
pub use error::{CuratorError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
