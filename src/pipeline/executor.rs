//! Drives one record through transcribe, score, then persist or discard.

use crate::error::Result;
use crate::pipeline::context::ResourceContext;
use crate::pipeline::error::{ErrorReporter, LogReporter, PipelineFailure, panic_message};
use crate::pipeline::record::{ChunkRecord, Outcome, RecordOutcome, Stage};
use crate::quality::{GateVerdict, QualityGate};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Per-record state machine.
///
/// `Created -> Transcribed -> Scored -> Persisted | Discarded`, with any
/// error or panic turning into `Errored` at the stage last reached. Nothing
/// escapes [`PipelineExecutor::execute`], so sibling records are unaffected.
pub struct PipelineExecutor {
    context: Arc<ResourceContext>,
    gate: QualityGate,
    reporter: Arc<dyn ErrorReporter>,
}

impl PipelineExecutor {
    pub fn new(context: Arc<ResourceContext>, gate: QualityGate) -> Self {
        Self {
            context,
            gate,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    /// Run `record` to a terminal outcome.
    pub fn execute(&self, record: ChunkRecord) -> RecordOutcome {
        let label = record.label.clone();
        let reached = Cell::new(Stage::Created);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.advance(record, &reached)));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => Outcome::Errored {
                stage: reached.get(),
                cause: error.to_string(),
            },
            Err(payload) => Outcome::Errored {
                stage: reached.get(),
                cause: format!("panicked: {}", panic_message(payload.as_ref())),
            },
        };

        match &outcome {
            Outcome::Errored { stage, cause } => {
                self.reporter.report(
                    &label,
                    &PipelineFailure::Record {
                        stage: *stage,
                        cause: cause.clone(),
                    },
                );
            }
            Outcome::Persisted { chunk_id, .. } => {
                tracing::debug!(record = %label, chunk_id = %chunk_id, "persisted");
            }
            Outcome::Discarded { score } => {
                tracing::info!(record = %label, wer = ?score, "dropped chunk due to high WER");
            }
        }

        RecordOutcome { label, outcome }
    }

    fn advance(&self, mut record: ChunkRecord, reached: &Cell<Stage>) -> Result<Outcome> {
        let transcriber = self.context.transcriber()?;
        let transcript = transcriber.transcribe(&record.chunk.samples, record.chunk.sample_rate)?;
        let hypothesis = transcript.text.clone();
        record.transcript = Some(transcript);
        reached.set(Stage::Transcribed);

        record.verdict = Some(self.gate.evaluate(&record.original_text, &hypothesis));
        reached.set(Stage::Scored);

        match record.verdict {
            Some(GateVerdict::Pass { .. }) => {
                let receipt = self.context.sink()?.persist(&record)?;
                Ok(Outcome::Persisted {
                    chunk_id: receipt.chunk_id,
                    audio_url: receipt.audio_url,
                })
            }
            Some(GateVerdict::Fail { score }) => Ok(Outcome::Discarded { score: Some(score) }),
            // Fail closed: never persist an unscored record
            None => Ok(Outcome::Discarded { score: None }),
        }
    }
}
