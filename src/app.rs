//! Composition root.
//!
//! Wires configuration into engines: manifest → detector → segmenter →
//! batch scheduler → executor → sink.

use crate::audio::EnergyDetector;
use crate::audio::wav::read_wav_file;
use crate::config::{Config, StorageBackend, StorageConfig, SttConfig};
use crate::dataset::{DatasetItem, ManifestSource};
use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::pipeline::{
    BatchScheduler, ChunkStream, FanOutStats, PipelineExecutor, ResourceContext, RunSummary,
};
use crate::quality::{GateVerdict, QualityGate, normalize_text};
use crate::segmenter::{ChunkKind, Segmenter};
use crate::sink::{ChunkSink, DirectorySink};
use crate::stt::{Transcriber, WhisperConfig, WhisperTranscriber};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// What a finished `run` reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub items: usize,
    pub skipped_items: usize,
    pub chunks: usize,
}

impl RunReport {
    fn new(summary: RunSummary, stats: FanOutStats) -> Self {
        Self {
            summary,
            items: stats.items,
            skipped_items: stats.skipped_items,
            chunks: stats.chunks,
        }
    }
}

/// One entry of a chunk plan, as printed by `segment`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChunk {
    pub index: usize,
    pub start_sample: usize,
    pub end_sample: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub kind: ChunkKind,
}

/// Result of scoring one reference/hypothesis pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub reference: String,
    pub hypothesis: String,
    pub threshold: f64,
    #[serde(flatten)]
    pub verdict: GateVerdict,
}

/// Build the Whisper engine described by `stt`.
pub fn build_transcriber(stt: &SttConfig) -> Result<Arc<dyn Transcriber>> {
    let config = WhisperConfig {
        model_path: PathBuf::from(&stt.model),
        language: stt.language.clone(),
        threads: stt.threads,
    };
    Ok(Arc::new(WhisperTranscriber::new(config)?))
}

/// Build the sink selected by `storage.backend`.
pub fn build_sink(storage: &StorageConfig) -> Result<Arc<dyn ChunkSink>> {
    match storage.backend {
        StorageBackend::Directory => Ok(Arc::new(DirectorySink::new(&storage.output_dir)?)),
        StorageBackend::Supabase => build_supabase_sink(storage),
    }
}

#[cfg(feature = "supabase")]
fn build_supabase_sink(storage: &StorageConfig) -> Result<Arc<dyn ChunkSink>> {
    use crate::sink::{SupabaseConfig, SupabaseSink};

    let config = SupabaseConfig {
        bucket: storage.bucket.clone(),
        table: storage.table.clone(),
        ..SupabaseConfig::new(&storage.url, &storage.service_role_key)
    };
    Ok(Arc::new(SupabaseSink::new(config)?))
}

#[cfg(not(feature = "supabase"))]
fn build_supabase_sink(_storage: &StorageConfig) -> Result<Arc<dyn ChunkSink>> {
    Err(CuratorError::ConfigInvalidValue {
        key: "storage.backend".to_string(),
        message: "built without the 'supabase' feature; use the directory backend".to_string(),
    })
}

/// Engines are built lazily from `config` and shared by every worker.
pub fn resource_context(config: &Config) -> ResourceContext {
    let stt = config.stt.clone();
    let storage = config.storage.clone();
    ResourceContext::new(move || build_transcriber(&stt), move || build_sink(&storage))
}

/// Curate every item listed in `manifest`.
///
/// Configuration and engine failures are returned before any record is
/// processed; per-item and per-record failures only show up in the report.
pub fn run_manifest(
    config: &Config,
    manifest: &Path,
    dataset_id: &str,
    shutdown: &AtomicBool,
) -> Result<RunReport> {
    config.validate()?;
    check_storage(&config.storage)?;
    let context = Arc::new(resource_context(config));
    context.warm_up()?;

    let source = ManifestSource::open(manifest, dataset_id)?;
    tracing::info!(
        manifest = %manifest.display(),
        ?source,
        batch_size = config.pipeline.batch_size,
        max_workers = config.pipeline.max_workers,
        "starting curation run"
    );
    run_items(config, context, source, shutdown)
}

/// Curate items from any source using prepared engines.
pub fn run_items<S>(
    config: &Config,
    context: Arc<ResourceContext>,
    source: S,
    shutdown: &AtomicBool,
) -> Result<RunReport>
where
    S: Iterator<Item = Result<DatasetItem>>,
{
    config.validate()?;

    let mut stream = ChunkStream::new(
        source,
        EnergyDetector::new(config.vad),
        Segmenter::new(config.segmenter),
    );
    let executor = PipelineExecutor::new(context, QualityGate::new(config.quality.wer_threshold));
    let scheduler = BatchScheduler::new(config.pipeline, Arc::new(executor));

    let summary = scheduler.run(stream.by_ref(), shutdown);
    Ok(RunReport::new(summary, stream.stats()))
}

/// Detect speech in one file and show the chunks it would produce.
pub fn plan_chunks(config: &Config, audio: &Path) -> Result<Vec<PlannedChunk>> {
    use crate::audio::SpeechDetector;

    config.validate()?;
    let buffer = read_wav_file(audio, defaults::SAMPLE_RATE)?;
    let detector = EnergyDetector::new(config.vad);
    let intervals = detector.detect(buffer.samples(), buffer.sample_rate())?;
    let chunks = Segmenter::new(config.segmenter).segment(&intervals, &buffer)?;

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| PlannedChunk {
            index,
            start_sample: chunk.start_sample,
            end_sample: chunk.end_sample,
            start_time: chunk.start_time,
            end_time: chunk.end_time,
            duration: chunk.duration,
            kind: chunk.kind,
        })
        .collect())
}

/// Score a hypothesis against a reference with the configured threshold.
pub fn score(config: &Config, reference: &str, hypothesis: &str) -> ScoreReport {
    let gate = QualityGate::new(config.quality.wer_threshold);
    ScoreReport {
        reference: normalize_text(reference),
        hypothesis: normalize_text(hypothesis),
        threshold: gate.threshold(),
        verdict: gate.evaluate(reference, hypothesis),
    }
}

/// Reject a run that would have nowhere to put its output.
pub fn check_storage(storage: &StorageConfig) -> Result<()> {
    if storage.backend == StorageBackend::Supabase {
        if storage.url.trim().is_empty() {
            return Err(CuratorError::MissingCredential {
                name: "SUPABASE_URL".to_string(),
                hint: "set it in the environment or use --storage directory".to_string(),
            });
        }
        if storage.service_role_key.trim().is_empty() {
            return Err(CuratorError::MissingCredential {
                name: "SUPABASE_SERVICE_ROLE_KEY".to_string(),
                hint: "set it in the environment or use --storage directory".to_string(),
            });
        }
    }
    Ok(())
}
