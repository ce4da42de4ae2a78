//! Destinations for chunks that pass the quality gate.
//!
//! Every sink follows the same protocol: encode the chunk as 16-bit PCM WAV,
//! store the blob under `{dataset_id}/{uuid}.wav`, resolve a URL for it, then
//! write the [`SpeechChunkRow`] metadata row pointing at that URL.

pub mod directory;
pub mod row;
#[cfg(feature = "supabase")]
pub mod supabase;

pub use directory::DirectorySink;
pub use row::{AlignedTranscript, ChunkStatus, SpeechChunkRow};
#[cfg(feature = "supabase")]
pub use supabase::{SupabaseConfig, SupabaseSink};

use crate::error::{CuratorError, Result};
use crate::pipeline::record::ChunkRecord;
use std::sync::{Arc, Mutex};

/// Where a persisted chunk ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReceipt {
    pub chunk_id: String,
    pub audio_url: String,
}

/// Stores passing chunks. Called at most once per record, possibly from
/// several worker threads at once.
pub trait ChunkSink: Send + Sync {
    fn persist(&self, record: &ChunkRecord) -> Result<PersistReceipt>;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "sink"
    }
}

impl<T: ChunkSink + ?Sized> ChunkSink for Arc<T> {
    fn persist(&self, record: &ChunkRecord) -> Result<PersistReceipt> {
        (**self).persist(record)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Fresh chunk identifier.
pub fn new_chunk_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Object key of a chunk's audio inside its bucket or directory.
pub fn storage_path(dataset_id: &str, chunk_id: &str) -> String {
    format!("{}/{}.wav", dataset_id, chunk_id)
}

/// A row plus the encoded audio it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedChunk {
    pub row: SpeechChunkRow,
    pub wav: Vec<u8>,
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct CollectorSink {
    collected: Arc<Mutex<Vec<CollectedChunk>>>,
    should_fail: bool,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the sink to reject every chunk
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Everything persisted so far, shared between clones.
    pub fn collected(&self) -> Vec<CollectedChunk> {
        self.collected
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.collected.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkSink for CollectorSink {
    fn persist(&self, record: &ChunkRecord) -> Result<PersistReceipt> {
        if self.should_fail {
            return Err(CuratorError::Persistence {
                message: "collector configured to fail".to_string(),
            });
        }

        let chunk_id = new_chunk_id();
        let audio_url = format!(
            "memory://{}",
            storage_path(&record.dataset_id, &chunk_id)
        );
        let wav = crate::audio::wav::encode_wav(&record.chunk.samples, record.chunk.sample_rate)?;
        let row = SpeechChunkRow::from_record(record, &chunk_id, &audio_url)?;

        self.collected
            .lock()
            .map_err(|e| CuratorError::Persistence {
                message: format!("collector lock poisoned: {}", e),
            })?
            .push(CollectedChunk { row, wav });

        Ok(PersistReceipt {
            chunk_id,
            audio_url,
        })
    }

    fn name(&self) -> &str {
        "collector"
    }
}
