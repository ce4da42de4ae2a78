//! Error types for speech-curator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CuratorError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Missing required credential {name}: {hint}")]
    MissingCredential { name: String, hint: String },

    // Segmentation errors
    #[error("Segmentation failed: {message}")]
    Segmentation { message: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Persistence errors
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    // Input errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Dataset error: {message}")]
    Dataset { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`CuratorError`] used for reporting and for
/// deciding whether a failure is fatal to the run, to an item, or to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed speech intervals. Fatal to one item's fan-out.
    Segmentation,
    /// Transcriber failed. Fatal to one record.
    Transcription,
    /// Sink failed. Fatal to one record.
    Persistence,
    /// Missing credentials, invalid settings. Fatal at startup.
    Configuration,
    /// Unreadable dataset entries or audio.
    Input,
}

impl CuratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CuratorError::ConfigFileNotFound { .. }
            | CuratorError::ConfigParse { .. }
            | CuratorError::ConfigInvalidValue { .. }
            | CuratorError::Config(_)
            | CuratorError::MissingCredential { .. }
            | CuratorError::TranscriptionModelNotFound { .. } => ErrorKind::Configuration,
            CuratorError::Segmentation { .. } => ErrorKind::Segmentation,
            CuratorError::Transcription { .. } => ErrorKind::Transcription,
            CuratorError::Persistence { .. } => ErrorKind::Persistence,
            CuratorError::AudioDecode { .. }
            | CuratorError::Dataset { .. }
            | CuratorError::Io(_)
            | CuratorError::Json(_)
            | CuratorError::Other(_) => ErrorKind::Input,
        }
    }
}

pub type Result<T> = std::result::Result<T, CuratorError>;
