//! The metadata row stored for every persisted chunk.

use crate::error::{CuratorError, Result};
use crate::pipeline::record::ChunkRecord;
use crate::quality::gate::round3;
use crate::stt::TranscriptWord;
use serde::{Deserialize, Serialize};

/// Human review state. The pipeline always writes `PendingReview`; the other
/// values are set by reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    PendingReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedTranscript {
    pub transcribed_text: String,
    pub aligned_words: Vec<TranscriptWord>,
}

/// One row of the `speech_chunks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechChunkRow {
    pub id: String,
    pub dataset_id: String,
    pub speaker_id: String,
    pub audio_url: String,
    pub original_text: String,
    pub aligned_text_with_timestamps: AlignedTranscript,
    pub wer_score: f64,
    /// Seconds, padding included.
    pub duration: f64,
    pub status: ChunkStatus,
}

impl SpeechChunkRow {
    /// Build the row for a scored record.
    ///
    /// Fails if the record was never transcribed or scored.
    pub fn from_record(record: &ChunkRecord, id: &str, audio_url: &str) -> Result<Self> {
        let transcript = record
            .transcript
            .as_ref()
            .ok_or_else(|| CuratorError::Persistence {
                message: format!("record {} has no transcript", record.label),
            })?;
        let verdict = record.verdict.ok_or_else(|| CuratorError::Persistence {
            message: format!("record {} has not been scored", record.label),
        })?;

        Ok(Self {
            id: id.to_string(),
            dataset_id: record.dataset_id.clone(),
            speaker_id: record.speaker_id.clone(),
            audio_url: audio_url.to_string(),
            original_text: record.original_text.clone(),
            aligned_text_with_timestamps: AlignedTranscript {
                transcribed_text: transcript.text.clone(),
                aligned_words: transcript.words.clone(),
            },
            wer_score: verdict.score(),
            duration: round3(record.chunk.duration),
            status: ChunkStatus::PendingReview,
        })
    }
}
