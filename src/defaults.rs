//! Default configuration constants for speech-curator.
//!
//! Shared by the config types, the pipeline components and the CLI so that
//! every tunable has exactly one default.

/// Sample rate every dataset item is normalized to before segmentation.
///
/// 16kHz is what speech models expect and what the detector is tuned for.
pub const SAMPLE_RATE: u32 = 16000;

/// Shortest chunk the segmenter emits, in seconds. Shorter regions are padded.
pub const MIN_CHUNK_SECS: f64 = 5.0;

/// Longest chunk the segmenter emits, in seconds. Longer regions are split.
pub const MAX_CHUNK_SECS: f64 = 15.0;

/// Highest word error rate a chunk may have and still be persisted.
pub const WER_THRESHOLD: f64 = 0.15;

/// Number of chunk records admitted into one scheduling round.
pub const BATCH_SIZE: usize = 10;

/// Concurrent workers inside one batch.
pub const MAX_WORKERS: usize = 4;

/// RMS threshold (0.0 to 1.0) above which a detector frame counts as speech.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Detector analysis frame length in milliseconds.
pub const VAD_FRAME_MS: u32 = 30;

/// Speech runs shorter than this are dropped as clicks and breaths.
pub const VAD_MIN_SPEECH_MS: u32 = 250;

/// Silence must last this long before a speech run is closed.
pub const VAD_MIN_SILENCE_MS: u32 = 100;

/// Padding added on both sides of every detected speech run.
pub const VAD_SPEECH_PAD_MS: u32 = 30;

/// Default Whisper model file.
pub const DEFAULT_MODEL: &str = "models/ggml-base.en.bin";

/// Default transcription language. The reference texts are English.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Storage bucket chunk audio is uploaded to.
pub const STORAGE_BUCKET: &str = "audio_chunks";

/// Metadata table persisted rows are inserted into.
pub const METADATA_TABLE: &str = "speech_chunks";

/// Dataset id used when a manifest does not name one.
pub const DEFAULT_DATASET_ID: &str = "unknown_ds";

/// Metadata file written by the directory sink.
pub const DIRECTORY_METADATA_FILE: &str = "speech_chunks.jsonl";
