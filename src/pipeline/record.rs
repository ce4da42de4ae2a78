//! The unit of work flowing through the executor.

use crate::quality::GateVerdict;
use crate::segmenter::Chunk;
use crate::stt::Transcript;
use serde::Serialize;
use std::fmt;

/// One chunk plus the metadata of the utterance it was cut from.
///
/// Created at fan-out with `transcript` and `verdict` unset. A single executor
/// owns the record from then on and fills both in as it advances.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    /// Reference transcript of the whole source utterance.
    pub original_text: String,
    pub dataset_id: String,
    pub speaker_id: String,
    /// Where the record came from, for logs (`<item>#<chunk index>`).
    pub label: String,
    pub transcript: Option<Transcript>,
    pub verdict: Option<GateVerdict>,
}

impl ChunkRecord {
    pub fn new(
        chunk: Chunk,
        original_text: impl Into<String>,
        dataset_id: impl Into<String>,
        speaker_id: impl Into<String>,
    ) -> Self {
        Self {
            chunk,
            original_text: original_text.into(),
            dataset_id: dataset_id.into(),
            speaker_id: speaker_id.into(),
            label: String::new(),
            transcript: None,
            verdict: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Stage the record has reached.
    pub fn stage(&self) -> Stage {
        match (&self.transcript, &self.verdict) {
            (_, Some(_)) => Stage::Scored,
            (Some(_), None) => Stage::Transcribed,
            (None, None) => Stage::Created,
        }
    }
}

/// Non-terminal record states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    Transcribed,
    Scored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::Transcribed => "transcribed",
            Stage::Scored => "scored",
        };
        f.write_str(name)
    }
}

/// Terminal state of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Passed the gate and was stored.
    Persisted { chunk_id: String, audio_url: String },
    /// Failed the gate (or was never scored); nothing was stored.
    Discarded { score: Option<f64> },
    /// A stage failed or panicked. `stage` is the last state reached.
    Errored { stage: Stage, cause: String },
}

impl Outcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Outcome::Persisted { .. })
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Outcome::Discarded { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Outcome::Errored { .. })
    }
}

/// An outcome tagged with the record it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub label: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}
