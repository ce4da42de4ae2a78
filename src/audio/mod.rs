//! Audio primitives: shared sample buffers, WAV I/O and speech detection.

pub mod buffer;
pub mod vad;
pub mod wav;

pub use buffer::AudioBuffer;
pub use vad::{EnergyDetector, SpeechDetector, VadConfig};
