//! Bounded batches over a bounded worker pool.
//!
//! Records are pulled from the stream `batch_size` at a time. Each batch is
//! spread across at most `max_workers` scoped threads sharing one work queue,
//! and the next batch is not pulled until every record of the current one
//! has reached a terminal outcome.

use crate::defaults;
use crate::pipeline::error::panic_message;
use crate::pipeline::executor::PipelineExecutor;
use crate::pipeline::record::{ChunkRecord, Outcome, RecordOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_workers: defaults::MAX_WORKERS,
        }
    }
}

/// Result of one scheduling round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Zero-based batch number.
    pub index: usize,
    pub persisted: usize,
    pub discarded: usize,
    pub errored: usize,
    pub elapsed: Duration,
    /// Completion order, not submission order.
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn size(&self) -> usize {
        self.outcomes.len()
    }

    fn from_outcomes(index: usize, outcomes: Vec<RecordOutcome>, elapsed: Duration) -> Self {
        let mut report = Self {
            index,
            elapsed,
            ..Self::default()
        };
        for result in &outcomes {
            match result.outcome {
                Outcome::Persisted { .. } => report.persisted += 1,
                Outcome::Discarded { .. } => report.discarded += 1,
                Outcome::Errored { .. } => report.errored += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub batches: usize,
    pub records: usize,
    pub persisted: usize,
    pub discarded: usize,
    pub errored: usize,
    /// The run stopped early because shutdown was requested.
    pub interrupted: bool,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    fn add(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.records += report.size();
        self.persisted += report.persisted;
        self.discarded += report.discarded;
        self.errored += report.errored;
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

type BatchObserver = Box<dyn Fn(&BatchReport) + Send + Sync>;

pub struct BatchScheduler {
    config: SchedulerConfig,
    executor: Arc<PipelineExecutor>,
    observer: Option<BatchObserver>,
}

impl BatchScheduler {
    /// Zero sizes are raised to 1.
    pub fn new(config: SchedulerConfig, executor: Arc<PipelineExecutor>) -> Self {
        let config = SchedulerConfig {
            batch_size: config.batch_size.max(1),
            max_workers: config.max_workers.max(1),
        };
        Self {
            config,
            executor,
            observer: None,
        }
    }

    /// Called with every batch report, after it is logged.
    pub fn with_observer(mut self, observer: impl Fn(&BatchReport) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Process `records` until the stream ends or `shutdown` is set.
    ///
    /// `shutdown` is only checked between batches; a batch in flight always
    /// drains.
    pub fn run<I>(&self, records: I, shutdown: &AtomicBool) -> RunSummary
    where
        I: IntoIterator<Item = ChunkRecord>,
    {
        let started = Instant::now();
        let mut records = records.into_iter();
        let mut summary = RunSummary::default();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                tracing::warn!(
                    processed = summary.records,
                    "shutdown requested, stopping before next batch"
                );
                summary.interrupted = true;
                break;
            }

            let batch: Vec<ChunkRecord> = records.by_ref().take(self.config.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let report = self.run_batch(summary.batches, batch);
            summary.add(&report);

            tracing::info!(
                batch = report.index,
                size = report.size(),
                persisted = report.persisted,
                discarded = report.discarded,
                errored = report.errored,
                elapsed_ms = report.elapsed.as_millis() as u64,
                total = summary.records,
                "batch complete"
            );
            if let Some(observer) = &self.observer {
                observer(&report);
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            records = summary.records,
            batches = summary.batches,
            persisted = summary.persisted,
            discarded = summary.discarded,
            errored = summary.errored,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "run finished"
        );
        summary
    }

    /// Run one batch to completion on a fresh scoped pool.
    pub fn run_batch(&self, index: usize, batch: Vec<ChunkRecord>) -> BatchReport {
        let started = Instant::now();
        let workers = self.config.max_workers.min(batch.len()).max(1);

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ChunkRecord>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<RecordOutcome>();

        for record in batch {
            if job_tx.send(record).is_err() {
                break;
            }
        }
        // Workers exit once the queue is drained
        drop(job_tx);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    let executor = &self.executor;
                    scope.spawn(move || {
                        while let Ok(record) = job_rx.recv() {
                            if result_tx.send(executor.execute(record)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                if let Err(payload) = handle.join() {
                    tracing::error!(
                        "batch worker panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        });
        drop(result_tx);

        let outcomes: Vec<RecordOutcome> = result_rx.try_iter().collect();
        BatchReport::from_outcomes(index, outcomes, started.elapsed())
    }
}
