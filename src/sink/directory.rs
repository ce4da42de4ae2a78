//! Local filesystem sink: WAV files plus a JSON Lines metadata table.

use super::{ChunkSink, PersistReceipt, SpeechChunkRow, new_chunk_id, storage_path};
use crate::audio::wav::encode_wav;
use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::pipeline::record::ChunkRecord;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Writes `<root>/<dataset_id>/<uuid>.wav` and appends one row per chunk to
/// `<root>/speech_chunks.jsonl`.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    metadata: Mutex<PathBuf>,
}

impl DirectorySink {
    /// Create the output directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CuratorError::Persistence {
            message: format!("Failed to create {}: {}", root.display(), e),
        })?;
        let metadata = root.join(defaults::DIRECTORY_METADATA_FILE);
        Ok(Self {
            root,
            metadata: Mutex::new(metadata),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the metadata table.
    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(defaults::DIRECTORY_METADATA_FILE)
    }

    fn append_row(&self, row: &SpeechChunkRow) -> Result<()> {
        let line = serde_json::to_string(row)?;
        let path = self.metadata.lock().map_err(|e| CuratorError::Persistence {
            message: format!("metadata lock poisoned: {}", e),
        })?;
        let mut file = OpenOptions::new().create(true).append(true).open(&*path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl ChunkSink for DirectorySink {
    fn persist(&self, record: &ChunkRecord) -> Result<PersistReceipt> {
        let chunk_id = new_chunk_id();
        let relative = storage_path(&record.dataset_id, &chunk_id);
        let wav_path = self.root.join(&relative);

        let audio_url = format!("file://{}", wav_path.display());
        let row = SpeechChunkRow::from_record(record, &chunk_id, &audio_url)?;

        let wav = encode_wav(&record.chunk.samples, record.chunk.sample_rate)?;
        if let Some(parent) = wav_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CuratorError::Persistence {
                message: format!("Failed to create {}: {}", parent.display(), e),
            })?;
        }
        fs::write(&wav_path, wav).map_err(|e| CuratorError::Persistence {
            message: format!("Failed to write {}: {}", wav_path.display(), e),
        })?;

        self.append_row(&row).map_err(|e| CuratorError::Persistence {
            message: format!(
                "Failed to record metadata, {} is orphaned: {}",
                wav_path.display(),
                e
            ),
        })?;

        Ok(PersistReceipt {
            chunk_id,
            audio_url,
        })
    }

    fn name(&self) -> &str {
        "directory"
    }
}
