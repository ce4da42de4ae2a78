//! Turns a stream of dataset items into a stream of chunk records.

use crate::audio::SpeechDetector;
use crate::dataset::DatasetItem;
use crate::error::{CuratorError, Result};
use crate::pipeline::error::{ErrorReporter, LogReporter, PipelineFailure};
use crate::pipeline::record::ChunkRecord;
use crate::segmenter::Segmenter;
use std::collections::VecDeque;
use std::sync::Arc;

/// Counters for what the fan-out has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutStats {
    pub items: usize,
    pub skipped_items: usize,
    pub chunks: usize,
}

/// Lazy item-to-records expansion.
///
/// Pulls one item at a time, runs detection and segmentation on it, and
/// yields its chunks as records carrying the item's reference text, dataset
/// id and speaker id. Items that fail to load or segment are reported and
/// skipped.
pub struct ChunkStream<S, D> {
    source: S,
    detector: D,
    segmenter: Segmenter,
    pending: VecDeque<ChunkRecord>,
    reporter: Arc<dyn ErrorReporter>,
    stats: FanOutStats,
}

impl<S, D> ChunkStream<S, D>
where
    S: Iterator<Item = Result<DatasetItem>>,
    D: SpeechDetector,
{
    pub fn new(source: S, detector: D, segmenter: Segmenter) -> Self {
        Self {
            source,
            detector,
            segmenter,
            pending: VecDeque::new(),
            reporter: Arc::new(LogReporter),
            stats: FanOutStats::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn stats(&self) -> FanOutStats {
        self.stats
    }

    fn expand(&self, item: DatasetItem) -> Result<Vec<ChunkRecord>> {
        let intervals = self
            .detector
            .detect(item.audio.samples(), item.audio.sample_rate())?;
        let chunks = self.segmenter.segment(&intervals, &item.audio)?;
        tracing::debug!(
            item = %item.label,
            intervals = intervals.len(),
            chunks = chunks.len(),
            "segmented item"
        );

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                ChunkRecord::new(
                    chunk,
                    item.reference_text.clone(),
                    item.dataset_id.clone(),
                    item.speaker_id.clone(),
                )
                .with_label(format!("{}#{}", item.label, index))
            })
            .collect())
    }

    fn skip(&mut self, source: &str, error: &CuratorError) {
        self.stats.skipped_items += 1;
        self.reporter.report(
            source,
            &PipelineFailure::Item {
                kind: error.kind(),
                message: error.to_string(),
            },
        );
    }
}

impl<S, D> Iterator for ChunkStream<S, D>
where
    S: Iterator<Item = Result<DatasetItem>>,
    D: SpeechDetector,
{
    type Item = ChunkRecord;

    fn next(&mut self) -> Option<ChunkRecord> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(record);
            }

            let item = self.source.next()?;
            self.stats.items += 1;
            let position = self.stats.items;

            match item {
                Ok(item) => {
                    let label = item.label.clone();
                    match self.expand(item) {
                        Ok(records) => {
                            self.stats.chunks += records.len();
                            self.pending.extend(records);
                        }
                        Err(error) => self.skip(&label, &error),
                    }
                }
                Err(error) => self.skip(&format!("item {}", position), &error),
            }
        }
    }
}
