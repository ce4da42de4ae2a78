//! Speech interval detection.
//!
//! The pipeline only depends on the [`SpeechDetector`] trait. The bundled
//! [`EnergyDetector`] frames the audio, thresholds each frame's RMS level and
//! runs a small state machine to turn frame decisions into padded speech
//! intervals.

use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::segmenter::SpeechInterval;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Finds speech-bearing regions in a full utterance.
///
/// Intervals are returned in samples, time-ordered and non-overlapping.
pub trait SpeechDetector: Send + Sync {
    fn detect(&self, audio: &[i16], sample_rate: u32) -> Result<Vec<SpeechInterval>>;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "detector"
    }
}

impl<T: SpeechDetector + ?Sized> SpeechDetector for Arc<T> {
    fn detect(&self, audio: &[i16], sample_rate: u32) -> Result<Vec<SpeechInterval>> {
        (**self).detect(audio, sample_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Configuration for the energy-based detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub threshold: f32,
    /// Analysis frame length (milliseconds).
    pub frame_ms: u32,
    /// Minimum speech run length kept (milliseconds).
    pub min_speech_ms: u32,
    /// Silence needed to close a speech run (milliseconds).
    pub min_silence_ms: u32,
    /// Padding added on both sides of each run (milliseconds).
    pub speech_pad_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::VAD_THRESHOLD,
            frame_ms: defaults::VAD_FRAME_MS,
            min_speech_ms: defaults::VAD_MIN_SPEECH_MS,
            min_silence_ms: defaults::VAD_MIN_SILENCE_MS,
            speech_pad_ms: defaults::VAD_SPEECH_PAD_MS,
        }
    }
}

/// Per-frame detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VadState {
    /// No speech detected.
    Idle,
    /// Speech run in progress.
    Speaking,
    /// Silence detected, waiting to confirm the run has ended.
    MaybeSilence,
}

/// RMS-threshold speech detector.
#[derive(Debug, Clone, Default)]
pub struct EnergyDetector {
    config: VadConfig,
}

impl EnergyDetector {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    /// Raw speech runs before padding, in samples.
    fn speech_runs(&self, audio: &[i16], sample_rate: u32) -> Vec<(usize, usize)> {
        let frame_len = ms_to_samples(self.config.frame_ms, sample_rate).max(1);
        let min_speech = ms_to_samples(self.config.min_speech_ms, sample_rate);
        let min_silence = ms_to_samples(self.config.min_silence_ms, sample_rate);

        let mut runs = Vec::new();
        let mut state = VadState::Idle;
        let mut speech_start = 0usize;
        let mut silence_start = 0usize;

        let mut close_run = |runs: &mut Vec<(usize, usize)>, start: usize, end: usize| {
            if end > start && end - start >= min_speech {
                runs.push((start, end));
            }
        };

        for (index, frame) in audio.chunks(frame_len).enumerate() {
            let frame_start = index * frame_len;
            let frame_end = frame_start + frame.len();
            let is_speech = calculate_rms(frame) > self.config.threshold;

            match state {
                VadState::Idle => {
                    if is_speech {
                        state = VadState::Speaking;
                        speech_start = frame_start;
                    }
                }
                VadState::Speaking => {
                    if !is_speech {
                        state = VadState::MaybeSilence;
                        silence_start = frame_start;
                    }
                }
                VadState::MaybeSilence => {
                    if is_speech {
                        state = VadState::Speaking;
                    } else if frame_end - silence_start >= min_silence {
                        close_run(&mut runs, speech_start, silence_start);
                        state = VadState::Idle;
                    }
                }
            }
        }

        match state {
            VadState::Speaking => close_run(&mut runs, speech_start, audio.len()),
            VadState::MaybeSilence => close_run(&mut runs, speech_start, silence_start),
            VadState::Idle => {}
        }

        runs
    }
}

impl SpeechDetector for EnergyDetector {
    fn detect(&self, audio: &[i16], sample_rate: u32) -> Result<Vec<SpeechInterval>> {
        if sample_rate == 0 {
            return Err(CuratorError::Segmentation {
                message: "cannot detect speech at a sample rate of 0".to_string(),
            });
        }

        let pad = ms_to_samples(self.config.speech_pad_ms, sample_rate);
        let mut intervals: Vec<SpeechInterval> = Vec::new();

        for (start, end) in self.speech_runs(audio, sample_rate) {
            let floor = intervals.last().map_or(0, |prev| prev.end);
            let padded_start = start.saturating_sub(pad).max(floor);
            let padded_end = (end + pad).min(audio.len());
            if padded_end > padded_start {
                intervals.push(SpeechInterval::new(padded_start, padded_end));
            }
        }

        Ok(intervals)
    }

    fn name(&self) -> &str {
        "energy"
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value where 0.0 is silence and 1.0 is a full-scale
/// square wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
