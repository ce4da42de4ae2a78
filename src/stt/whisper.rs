//! Whisper-based speech-to-text transcription.
//!
//! This module provides a Whisper implementation of the Transcriber trait using whisper-rs.
//! Word timings come from Whisper's token timestamps: sub-word tokens are
//! glued back into words on leading-space boundaries.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::quality::gate::round3;
use crate::stt::transcriber::{Transcriber, Transcript, TranscriptWord};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es", "fr"), or "auto"
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(defaults::DEFAULT_MODEL),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// A decoded token with its timing, as whisper reports it.
///
/// `t0`/`t1` are in centiseconds; negative values mean "no timestamp".
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TimedToken {
    pub text: String,
    pub t0: i64,
    pub t1: i64,
    pub p: f32,
}

/// Whisper-based transcriber implementation.
///
/// The WhisperContext is wrapped in a Mutex, so concurrent workers take turns
/// on the model.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// Reports itself as not ready so a run fails at warm-up instead of erroring
/// on every record.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

fn model_name_from_path(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Load the model named by `config`.
    ///
    /// # Errors
    /// Returns `CuratorError::TranscriptionModelNotFound` if the model file doesn't exist
    /// Returns `CuratorError::Transcription` if model loading fails
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Keep whisper.cpp's own logging out of stderr
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(CuratorError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config);

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| CuratorError::Transcription {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| CuratorError::Transcription {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        tracing::info!(model = %model_name, "loaded whisper model");

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Stub constructor: only checks that the model file exists.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(CuratorError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config);
        Ok(Self { config, model_name })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

/// Convert i16 audio samples to f32 normalized to [-1.0, 1.0]
///
/// Whisper expects audio in f32 format normalized to the range [-1.0, 1.0].
pub(crate) fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

fn is_special_token(text: &str) -> bool {
    text.starts_with("[_") || text.starts_with("<|")
}

/// Glue sub-word tokens into timed words.
///
/// A token starting with a space opens a new word. Special tokens are
/// skipped. Words with a missing or inverted timestamp are omitted. Word
/// confidence is the mean token probability.
pub(crate) fn group_tokens(tokens: &[TimedToken]) -> Vec<TranscriptWord> {
    struct Pending {
        text: String,
        t0: i64,
        t1: i64,
        p_sum: f64,
        count: usize,
    }

    fn finish(pending: Pending, words: &mut Vec<TranscriptWord>) {
        let word = pending.text.trim();
        if word.is_empty() || pending.t0 < 0 || pending.t1 < pending.t0 {
            return;
        }
        words.push(TranscriptWord {
            word: word.to_string(),
            start: round3(pending.t0 as f64 / 100.0),
            end: round3(pending.t1 as f64 / 100.0),
            confidence: round3((pending.p_sum / pending.count as f64).clamp(0.0, 1.0)),
        });
    }

    let mut words = Vec::new();
    let mut current: Option<Pending> = None;

    for token in tokens {
        if is_special_token(&token.text) || token.text.is_empty() {
            continue;
        }

        let starts_word = token.text.starts_with(' ');
        match current.as_mut() {
            Some(pending) if !starts_word => {
                pending.text.push_str(&token.text);
                pending.t1 = token.t1;
                pending.p_sum += token.p as f64;
                pending.count += 1;
            }
            _ => {
                if let Some(done) = current.take() {
                    finish(done, &mut words);
                }
                current = Some(Pending {
                    text: token.text.clone(),
                    t0: token.t0,
                    t1: token.t1,
                    p_sum: token.p as f64,
                    count: 1,
                });
            }
        }
    }

    if let Some(done) = current {
        finish(done, &mut words);
    }

    words
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<Transcript> {
        if sample_rate != defaults::SAMPLE_RATE {
            return Err(CuratorError::Transcription {
                message: format!(
                    "Whisper expects {} Hz audio, got {} Hz",
                    defaults::SAMPLE_RATE,
                    sample_rate
                ),
            });
        }

        let audio_f32 = convert_audio(audio);

        let context = self
            .context
            .lock()
            .map_err(|e| CuratorError::Transcription {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| CuratorError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        params.set_token_timestamps(true);
        params.set_no_context(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| CuratorError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        let mut tokens = Vec::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
            for index in 0..segment.n_tokens() {
                let Some(token) = segment.get_token(index) else {
                    continue;
                };
                let data = token.token_data();
                let piece = token
                    .to_str_lossy()
                    .map_err(|e| CuratorError::Transcription {
                        message: format!("Failed to decode token: {}", e),
                    })?;
                tokens.push(TimedToken {
                    text: piece.into_owned(),
                    t0: data.t0,
                    t1: data.t1,
                    p: data.p,
                });
            }
        }

        Ok(Transcript::new(text.trim(), group_tokens(&tokens)))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &[i16], _sample_rate: u32) -> Result<Transcript> {
        Err(CuratorError::Transcription {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release --features whisper\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
