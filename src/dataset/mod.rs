//! Dataset sources: utterance audio plus its reference transcript.
//!
//! A source is any `Iterator<Item = Result<DatasetItem>>`. Errors are per
//! item; the pipeline skips the item and keeps pulling.

use crate::audio::AudioBuffer;
use crate::audio::wav::read_wav_file;
use crate::defaults;
use crate::error::{CuratorError, Result};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// One utterance ready for segmentation. Audio is mono at the pipeline rate.
#[derive(Debug, Clone)]
pub struct DatasetItem {
    pub audio: AudioBuffer,
    pub reference_text: String,
    pub dataset_id: String,
    pub speaker_id: String,
    /// Human-readable origin, used in logs and record labels.
    pub label: String,
}

/// A manifest line: `{"audio": "a.wav", "text": "...", "speaker_id": 84}`.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    audio: PathBuf,
    text: String,
    #[serde(default, deserialize_with = "string_or_number")]
    speaker_id: String,
}

/// Speaker ids show up both as strings and as integers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Streams items from a JSON Lines manifest.
///
/// Audio paths are resolved relative to the manifest's directory and decoded
/// lazily, one item per `next()` call.
pub struct ManifestSource {
    lines: Lines<BufReader<File>>,
    base_dir: PathBuf,
    dataset_id: String,
    sample_rate: u32,
    line_number: usize,
}

impl std::fmt::Debug for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestSource")
            .field("base_dir", &self.base_dir)
            .field("dataset_id", &self.dataset_id)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl ManifestSource {
    pub fn open(path: &Path, dataset_id: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| CuratorError::Dataset {
            message: format!("Failed to open manifest {}: {}", path.display(), e),
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let dataset_id = if dataset_id.trim().is_empty() {
            defaults::DEFAULT_DATASET_ID.to_string()
        } else {
            dataset_id.to_string()
        };

        Ok(Self {
            lines: BufReader::new(file).lines(),
            base_dir,
            dataset_id,
            sample_rate: defaults::SAMPLE_RATE,
            line_number: 0,
        })
    }

    /// Resample audio to this rate instead of the default 16 kHz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn load(&self, line: &str) -> Result<DatasetItem> {
        let entry: ManifestEntry =
            serde_json::from_str(line).map_err(|e| CuratorError::Dataset {
                message: format!("line {}: {}", self.line_number, e),
            })?;
        let audio_path = self.base_dir.join(&entry.audio);
        let audio = read_wav_file(&audio_path, self.sample_rate)?;

        Ok(DatasetItem {
            audio,
            reference_text: entry.text,
            dataset_id: self.dataset_id.clone(),
            speaker_id: entry.speaker_id,
            label: entry.audio.display().to_string(),
        })
    }
}

impl Iterator for ManifestSource {
    type Item = Result<DatasetItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(CuratorError::Io(e))),
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.load(&line));
        }
    }
}

/// In-memory source.
#[derive(Debug, Default)]
pub struct VecSource {
    items: std::vec::IntoIter<DatasetItem>,
}

impl VecSource {
    pub fn new(items: Vec<DatasetItem>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl Iterator for VecSource {
    type Item = Result<DatasetItem>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(Ok)
    }
}
