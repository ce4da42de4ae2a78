//! Duration-bounded chunking of detected speech.
//!
//! Speech intervals are merged greedily into an accumulator while the merged
//! span stays within the maximum chunk length; silence between merged
//! intervals stays inside the chunk. Each flushed accumulator is then split,
//! padded, or emitted unchanged so that every chunk fits the configured
//! duration envelope.

use crate::audio::AudioBuffer;
use crate::defaults;
use crate::error::{CuratorError, Result};
use serde::{Deserialize, Serialize};

/// A speech-bearing region, in samples. Half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechInterval {
    pub start: usize,
    pub end: usize,
}

impl SpeechInterval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// How a chunk came out of the flush policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Emitted unchanged, already inside the envelope.
    Exact,
    /// Shorter than the minimum; trailing zeros were appended.
    Padded,
    /// One piece of an over-long region.
    Split,
}

/// A contiguous audio excerpt ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// First sample of the source region.
    pub start_sample: usize,
    /// One past the last source sample. Padding does not move this.
    pub end_sample: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub kind: ChunkKind,
}

/// Chunk duration bounds, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub min_chunk_secs: f64,
    pub max_chunk_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_chunk_secs: defaults::MIN_CHUNK_SECS,
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Turn ordered speech intervals into chunks inside the duration envelope.
    ///
    /// Fails with [`CuratorError::Segmentation`] when an interval is empty,
    /// runs past the end of the audio, or starts before its predecessor ends.
    pub fn segment(&self, intervals: &[SpeechInterval], audio: &AudioBuffer) -> Result<Vec<Chunk>> {
        validate_intervals(intervals, audio.len())?;

        let sample_rate = audio.sample_rate();
        let min_len = secs_to_samples(self.config.min_chunk_secs, sample_rate);
        let max_len = secs_to_samples(self.config.max_chunk_secs, sample_rate).max(1);

        let mut chunks = Vec::new();
        let mut accumulator: Option<(usize, usize)> = None;

        for interval in intervals {
            accumulator = match accumulator {
                None => Some((interval.start, interval.end)),
                Some((acc_start, acc_end)) if interval.end - acc_start > max_len => {
                    self.flush(audio, acc_start, acc_end, min_len, max_len, &mut chunks);
                    Some((interval.start, interval.end))
                }
                Some((acc_start, _)) => Some((acc_start, interval.end)),
            };
        }

        if let Some((acc_start, acc_end)) = accumulator {
            self.flush(audio, acc_start, acc_end, min_len, max_len, &mut chunks);
        }

        Ok(chunks)
    }

    fn flush(
        &self,
        audio: &AudioBuffer,
        start: usize,
        end: usize,
        min_len: usize,
        max_len: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let samples = audio.samples();
        let sample_rate = audio.sample_rate();
        let len = end - start;

        if len > max_len {
            let count = len.div_ceil(max_len);
            let target = len / count;
            for i in 0..count {
                let piece_start = start + i * target;
                let piece_end = if i + 1 == count { end } else { piece_start + target };
                chunks.push(make_chunk(
                    samples[piece_start..piece_end].to_vec(),
                    sample_rate,
                    piece_start,
                    piece_end,
                    ChunkKind::Split,
                ));
            }
        } else if len < min_len {
            let mut padded = Vec::with_capacity(min_len);
            padded.extend_from_slice(&samples[start..end]);
            padded.resize(min_len, 0);
            chunks.push(make_chunk(padded, sample_rate, start, end, ChunkKind::Padded));
        } else {
            chunks.push(make_chunk(
                samples[start..end].to_vec(),
                sample_rate,
                start,
                end,
                ChunkKind::Exact,
            ));
        }
    }
}

fn make_chunk(
    samples: Vec<i16>,
    sample_rate: u32,
    start_sample: usize,
    end_sample: usize,
    kind: ChunkKind,
) -> Chunk {
    let rate = sample_rate as f64;
    let start_time = start_sample as f64 / rate;
    let duration = samples.len() as f64 / rate;
    Chunk {
        start_time,
        end_time: start_time + duration,
        duration,
        samples,
        sample_rate,
        start_sample,
        end_sample,
        kind,
    }
}

fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64) as usize
}

fn validate_intervals(intervals: &[SpeechInterval], audio_len: usize) -> Result<()> {
    let mut previous_end = 0usize;
    for (index, interval) in intervals.iter().enumerate() {
        if interval.start >= interval.end {
            return Err(CuratorError::Segmentation {
                message: format!(
                    "interval {} is empty ({}..{})",
                    index, interval.start, interval.end
                ),
            });
        }
        if interval.end > audio_len {
            return Err(CuratorError::Segmentation {
                message: format!(
                    "interval {} ends at sample {} past the audio length {}",
                    index, interval.end, audio_len
                ),
            });
        }
        if interval.start < previous_end {
            return Err(CuratorError::Segmentation {
                message: format!(
                    "interval {} starts at sample {} before the previous one ends at {}",
                    index, interval.start, previous_end
                ),
            });
        }
        previous_end = interval.end;
    }
    Ok(())
}
