//! End-to-end pipeline scenarios with in-process engines.

use speech_curator::app::{plan_chunks, run_items};
use speech_curator::audio::AudioBuffer;
use speech_curator::audio::wav::encode_wav;
use speech_curator::config::Config;
use speech_curator::dataset::{DatasetItem, ManifestSource, VecSource};
use speech_curator::error::{CuratorError, Result};
use speech_curator::pipeline::{
    BatchScheduler, ChunkRecord, Outcome, PipelineExecutor, ResourceContext, SchedulerConfig,
    Stage,
};
use speech_curator::quality::QualityGate;
use speech_curator::segmenter::{Chunk, ChunkKind};
use speech_curator::sink::{CollectorSink, DirectorySink, SpeechChunkRow};
use speech_curator::stt::{MockTranscriber, Transcriber, Transcript};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const RATE: u32 = 16000;

/// Loud square wave, well above the detector threshold.
fn speech(secs: f64) -> Vec<i16> {
    let len = (secs * RATE as f64) as usize;
    (0..len).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect()
}

fn silence(secs: f64) -> Vec<i16> {
    vec![0; (secs * RATE as f64) as usize]
}

fn item(label: &str, samples: Vec<i16>, text: &str) -> DatasetItem {
    DatasetItem {
        audio: AudioBuffer::new(samples, RATE),
        reference_text: text.to_string(),
        dataset_id: "libritts".to_string(),
        speaker_id: "84".to_string(),
        label: label.to_string(),
    }
}

/// A record whose first sample carries its index, so scripted engines can
/// tell records apart.
fn tagged_record(index: usize) -> ChunkRecord {
    let mut samples = vec![0i16; 1600];
    samples[0] = index as i16;
    let chunk = Chunk {
        samples,
        sample_rate: RATE,
        start_sample: 0,
        end_sample: 1600,
        start_time: 0.0,
        end_time: 0.1,
        duration: 0.1,
        kind: ChunkKind::Exact,
    };
    ChunkRecord::new(chunk, "hello world", "ds", "1").with_label(format!("rec#{index}"))
}

fn scheduler_with(
    config: SchedulerConfig,
    transcriber: Arc<dyn Transcriber>,
    sink: CollectorSink,
) -> BatchScheduler {
    let context = ResourceContext::from_parts(transcriber, Arc::new(sink));
    let executor = PipelineExecutor::new(Arc::new(context), QualityGate::default());
    BatchScheduler::new(config, Arc::new(executor))
}

/// Tracks how many calls are in flight at once.
#[derive(Default)]
struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Transcriber for ConcurrencyProbe {
    fn transcribe(&self, _audio: &[i16], _sample_rate: u32) -> Result<Transcript> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Transcript::new("hello world", Vec::new()))
    }

    fn model_name(&self) -> &str {
        "probe"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Panics on every fifth record, fails on the one after it, and otherwise
/// alternates between a perfect and a wrong transcript.
struct ScriptedTranscriber;

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&self, audio: &[i16], _sample_rate: u32) -> Result<Transcript> {
        let index = audio[0] as usize;
        match index % 5 {
            0 => panic!("engine crashed on record {index}"),
            1 => Err(CuratorError::Transcription {
                message: format!("decoder error on record {index}"),
            }),
            2 | 3 => Ok(Transcript::new("hello world", Vec::new())),
            _ => Ok(Transcript::new("goodbye moon", Vec::new())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[test]
fn short_burst_becomes_one_padded_persisted_chunk() {
    let sink = CollectorSink::new();
    let context = Arc::new(ResourceContext::from_parts(
        Arc::new(MockTranscriber::new("mock").with_response("the quick brown fox")),
        Arc::new(sink.clone()),
    ));
    let mut samples = silence(2.0);
    samples.extend(speech(2.0));
    samples.extend(silence(2.0));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("burst.wav");
    std::fs::write(&path, encode_wav(&samples, RATE).unwrap()).unwrap();
    let planned = plan_chunks(&Config::default(), &path).unwrap();
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].kind, ChunkKind::Padded);
    assert!(planned[0].start_time >= 1.5, "start {}", planned[0].start_time);
    assert_eq!(planned[0].duration, 5.0);

    let report = run_items(
        &Config::default(),
        context,
        VecSource::new(vec![item("burst.wav", samples, "The quick brown fox.")]),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(report.chunks, 1);
    assert_eq!(report.summary.persisted, 1);
    let collected = sink.collected();
    let row = &collected[0].row;
    assert_eq!(row.duration, 5.0);
    assert_eq!(row.wer_score, 0.0);
    assert_eq!(row.dataset_id, "libritts");
    assert_eq!(row.speaker_id, "84");
    assert_eq!(row.aligned_text_with_timestamps.aligned_words.len(), 4);
}

#[test]
fn long_speech_splits_into_equal_chunks_with_full_reference() {
    let sink = CollectorSink::new();
    let context = Arc::new(ResourceContext::from_parts(
        Arc::new(MockTranscriber::new("mock").with_response("a long read passage")),
        Arc::new(sink.clone()),
    ));

    let report = run_items(
        &Config::default(),
        context,
        VecSource::new(vec![item("long.wav", speech(20.0), "A long read passage.")]),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(report.chunks, 2);
    assert_eq!(report.summary.persisted, 2);
    for collected in sink.collected() {
        assert_eq!(collected.row.duration, 10.0);
        assert_eq!(collected.row.original_text, "A long read passage.");
    }
}

#[test]
fn directory_backend_writes_wavs_and_rows() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(DirectorySink::new(dir.path()).unwrap());
    let context = Arc::new(ResourceContext::from_parts(
        Arc::new(MockTranscriber::new("mock").with_response("hello there")),
        sink.clone(),
    ));
    let items = vec![
        item("pass.wav", speech(6.0), "Hello there!"),
        item("fail.wav", speech(6.0), "Something unrelated"),
    ];

    let report = run_items(
        &Config::default(),
        context,
        VecSource::new(items),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(report.summary.persisted, 1);
    assert_eq!(report.summary.discarded, 1);

    let metadata = std::fs::read_to_string(sink.metadata_path()).unwrap();
    let rows: Vec<SpeechChunkRow> = metadata
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].original_text, "Hello there!");

    let raw: serde_json::Value = serde_json::from_str(metadata.lines().next().unwrap()).unwrap();
    assert_eq!(raw["status"], "pending_review");

    let wav = dir
        .path()
        .join("libritts")
        .join(format!("{}.wav", rows[0].id));
    let reader = hound::WavReader::open(&wav).unwrap();
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.spec().channels, 1);
}

#[test]
fn every_record_reaches_exactly_one_outcome() {
    let sink = CollectorSink::new();
    let scheduler = scheduler_with(
        SchedulerConfig {
            batch_size: 10,
            max_workers: 4,
        },
        Arc::new(ScriptedTranscriber),
        sink.clone(),
    );
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&outcomes);
    let scheduler =
        scheduler.with_observer(move |report| seen.lock().unwrap().extend(report.outcomes.clone()));

    let summary = scheduler.run((0..25).map(tagged_record), &AtomicBool::new(false));

    // 25 records: indices ≡ 0 panic, ≡ 1 fail, ≡ 2,3 pass, ≡ 4 discard
    assert_eq!(summary.records, 25);
    assert_eq!(summary.errored, 10);
    assert_eq!(summary.persisted, 10);
    assert_eq!(summary.discarded, 5);
    assert_eq!(sink.len(), 10);

    let outcomes = outcomes.lock().unwrap();
    let mut labels: Vec<&str> = outcomes.iter().map(|o| o.label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), 25);

    for result in outcomes.iter() {
        if let Outcome::Errored { stage, cause } = &result.outcome {
            assert_eq!(*stage, Stage::Created);
            assert!(cause.contains("crashed") || cause.contains("decoder error"));
        }
    }
}

#[test]
fn batches_are_ceil_of_records_over_batch_size() {
    for (records, batch_size, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (23, 10, 3), (7, 3, 3)] {
        let scheduler = scheduler_with(
            SchedulerConfig {
                batch_size,
                max_workers: 4,
            },
            Arc::new(MockTranscriber::new("mock").with_response("hello world")),
            CollectorSink::new(),
        );

        let summary = scheduler.run((0..records).map(tagged_record), &AtomicBool::new(false));

        assert_eq!(summary.batches, expected, "{records} records / {batch_size}");
        assert_eq!(summary.records, records);
    }
}

#[test]
fn in_flight_work_never_exceeds_max_workers() {
    let probe = Arc::new(ConcurrencyProbe::default());
    let scheduler = scheduler_with(
        SchedulerConfig {
            batch_size: 12,
            max_workers: 3,
        },
        probe.clone(),
        CollectorSink::new(),
    );

    let summary = scheduler.run((0..24).map(tagged_record), &AtomicBool::new(false));

    assert_eq!(summary.persisted, 24);
    assert!(probe.peak.load(Ordering::SeqCst) <= 3);
    assert!(probe.peak.load(Ordering::SeqCst) >= 1);
}

#[test]
fn batches_do_not_overlap() {
    // More workers than records per batch: overlap would push the peak past 2
    let probe = Arc::new(ConcurrencyProbe::default());
    let scheduler = scheduler_with(
        SchedulerConfig {
            batch_size: 2,
            max_workers: 8,
        },
        probe.clone(),
        CollectorSink::new(),
    );

    let summary = scheduler.run((0..10).map(tagged_record), &AtomicBool::new(false));

    assert_eq!(summary.batches, 5);
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn slow_engine_still_finishes_every_batch() {
    let transcriber = MockTranscriber::new("mock")
        .with_response("hello world")
        .with_delay(Duration::from_millis(5));
    let sink = CollectorSink::new();
    let scheduler = scheduler_with(
        SchedulerConfig {
            batch_size: 4,
            max_workers: 2,
        },
        Arc::new(transcriber.clone()),
        sink.clone(),
    );

    let summary = scheduler.run((0..9).map(tagged_record), &AtomicBool::new(false));

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.persisted, 9);
    assert_eq!(transcriber.call_count(), 9);
    assert_eq!(sink.len(), 9);
}

#[test]
fn corrupt_wav_in_manifest_is_skipped() {
    let dir = TempDir::new().unwrap();
    // Header claims a 0 Hz sample rate and a matching 0 byte rate
    let mut corrupt = encode_wav(&speech(1.0), RATE).unwrap();
    corrupt[24..32].fill(0);
    std::fs::write(dir.path().join("corrupt.wav"), corrupt).unwrap();
    std::fs::write(
        dir.path().join("ok.wav"),
        encode_wav(&speech(6.0), RATE).unwrap(),
    )
    .unwrap();
    let manifest = dir.path().join("manifest.jsonl");
    std::fs::write(
        &manifest,
        concat!(
            r#"{"audio": "corrupt.wav", "text": "Fine.", "speaker_id": 1}"#,
            "\n",
            r#"{"audio": "ok.wav", "text": "Fine.", "speaker_id": 2}"#,
            "\n",
        ),
    )
    .unwrap();

    let sink = CollectorSink::new();
    let context = Arc::new(ResourceContext::from_parts(
        Arc::new(MockTranscriber::new("mock").with_response("fine")),
        Arc::new(sink.clone()),
    ));
    let source = ManifestSource::open(&manifest, "libritts").unwrap();

    let report = run_items(&Config::default(), context, source, &AtomicBool::new(false)).unwrap();

    assert_eq!(report.items, 2);
    assert_eq!(report.skipped_items, 1);
    assert_eq!(report.summary.persisted, 1);
    assert_eq!(sink.collected()[0].row.speaker_id, "2");
}

#[test]
fn bad_items_are_skipped_and_counted() {
    let sink = CollectorSink::new();
    let context = Arc::new(ResourceContext::from_parts(
        Arc::new(MockTranscriber::new("mock").with_response("fine")),
        Arc::new(sink.clone()),
    ));
    let source = vec![
        Err(CuratorError::AudioDecode {
            message: "truncated header".to_string(),
        }),
        Ok(item("ok.wav", speech(6.0), "Fine.")),
        Ok(item("silent.wav", silence(6.0), "Nothing here.")),
    ]
    .into_iter();

    let report = run_items(&Config::default(), context, source, &AtomicBool::new(false)).unwrap();

    assert_eq!(report.items, 3);
    assert_eq!(report.skipped_items, 1);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.summary.persisted, 1);
}
