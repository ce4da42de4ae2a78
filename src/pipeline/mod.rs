//! Quality-gated curation pipeline.
//!
//! Items fan out into chunk records ([`fan_out`]), records are grouped into
//! bounded batches ([`scheduler`]), and each record is driven through
//! transcribe, score and persist-or-discard by the [`executor`].

pub mod context;
pub mod error;
pub mod executor;
pub mod fan_out;
pub mod record;
pub mod scheduler;

pub use context::ResourceContext;
pub use error::{ErrorReporter, LogReporter, PipelineFailure};
pub use executor::PipelineExecutor;
pub use fan_out::{ChunkStream, FanOutStats};
pub use record::{ChunkRecord, Outcome, RecordOutcome, Stage};
pub use scheduler::{BatchReport, BatchScheduler, RunSummary, SchedulerConfig};
