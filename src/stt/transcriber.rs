use crate::error::{CuratorError, Result};
use crate::quality::gate::round3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One aligned word. Times are seconds relative to the chunk start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Text plus word alignment for one chunk.
///
/// Engines may omit words they could not time; `text` is always complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub words: Vec<TranscriptWord>,
}

impl Transcript {
    pub fn new(text: impl Into<String>, words: Vec<TranscriptWord>) -> Self {
        Self {
            text: text.into(),
            words,
        }
    }
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock). Calls
/// may arrive from several worker threads at once; engines that cannot run
/// concurrently serialize internally.
pub trait Transcriber: Send + Sync {
    /// Transcribe mono 16-bit PCM samples recorded at `sample_rate`.
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcript>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across workers.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcript> {
        (**self).transcribe(audio, sample_rate)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing.
///
/// Returns a fixed response with evenly spaced word timings across the
/// audio. Can be configured to fail, panic or sleep, and counts calls.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    should_fail: bool,
    should_panic: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            should_panic: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to panic on transcribe
    pub fn with_panic(mut self) -> Self {
        self.should_panic = true;
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcribe calls so far, shared between clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn timed_words(&self, duration: f64) -> Vec<TranscriptWord> {
        let words: Vec<&str> = self.response.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }
        let step = duration / words.len() as f64;
        words
            .iter()
            .enumerate()
            .map(|(i, word)| TranscriptWord {
                word: (*word).to_string(),
                start: round3(i as f64 * step),
                end: round3((i + 1) as f64 * step),
                confidence: 1.0,
            })
            .collect()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.should_panic {
            panic!("mock transcriber panic");
        }

        if self.should_fail {
            return Err(CuratorError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }

        let duration = if sample_rate == 0 {
            0.0
        } else {
            audio.len() as f64 / sample_rate as f64
        };
        Ok(Transcript::new(
            self.response.clone(),
            self.timed_words(duration),
        ))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
