//! Layered configuration: defaults, then the TOML file, then environment
//! variables, then command-line flags (applied by the binary).

use crate::audio::VadConfig;
use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::pipeline::SchedulerConfig;
use crate::segmenter::SegmenterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: SchedulerConfig,
    pub segmenter: SegmenterConfig,
    pub quality: QualityConfig,
    pub vad: VadConfig,
    pub stt: SttConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    /// Highest WER that still passes the gate.
    pub wer_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            wer_threshold: defaults::WER_THRESHOLD,
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to a ggml Whisper model.
    pub model: String,
    pub language: String,
    /// Inference threads (unset = whisper's default).
    pub threads: Option<usize>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Supabase Storage bucket + PostgREST table.
    #[default]
    Supabase,
    /// WAV files and a JSON Lines table in a local directory.
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
    pub table: String,
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: String::new(),
            service_role_key: String::new(),
            bucket: defaults::STORAGE_BUCKET.to_string(),
            table: defaults::METADATA_TABLE.to_string(),
            output_dir: PathBuf::from("curated"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CuratorError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                CuratorError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(CuratorError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BATCH_SIZE → pipeline.batch_size
    /// - MAX_WORKERS → pipeline.max_workers
    /// - WER_THRESHOLD → quality.wer_threshold
    /// - SUPABASE_URL → storage.url
    /// - SUPABASE_SERVICE_ROLE_KEY → storage.service_role_key
    /// - CURATOR_MODEL → stt.model
    /// - CURATOR_LANGUAGE → stt.language
    ///
    /// Empty values are ignored.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::with_env_overrides`] with a custom variable lookup.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("BATCH_SIZE") {
            self.pipeline.batch_size = parse_value("BATCH_SIZE", &value)?;
        }
        if let Some(value) = var("MAX_WORKERS") {
            self.pipeline.max_workers = parse_value("MAX_WORKERS", &value)?;
        }
        if let Some(value) = var("WER_THRESHOLD") {
            self.quality.wer_threshold = parse_value("WER_THRESHOLD", &value)?;
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.storage.url = url;
        }
        if let Some(key) = var("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.service_role_key = key;
        }
        if let Some(model) = var("CURATOR_MODEL") {
            self.stt.model = model;
        }
        if let Some(language) = var("CURATOR_LANGUAGE") {
            self.stt.language = language;
        }

        Ok(self)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(invalid("pipeline.batch_size", "must be at least 1"));
        }
        if self.pipeline.max_workers == 0 {
            return Err(invalid("pipeline.max_workers", "must be at least 1"));
        }
        let min = self.segmenter.min_chunk_secs;
        let max = self.segmenter.max_chunk_secs;
        if !(min.is_finite() && min > 0.0) {
            return Err(invalid("segmenter.min_chunk_secs", "must be positive"));
        }
        if !(max.is_finite() && max >= min) {
            return Err(invalid(
                "segmenter.max_chunk_secs",
                &format!("must be at least min_chunk_secs ({})", min),
            ));
        }
        let threshold = self.quality.wer_threshold;
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(invalid("quality.wer_threshold", "must be zero or positive"));
        }
        if !(0.0..=1.0).contains(&self.vad.threshold) {
            return Err(invalid("vad.threshold", "must be between 0.0 and 1.0"));
        }
        if self.vad.frame_ms == 0 {
            return Err(invalid("vad.frame_ms", "must be at least 1"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/speech-curator/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("speech-curator").join("config.toml"))
            .ok_or_else(|| CuratorError::Other("Could not determine config directory".to_string()))
    }

    /// Look up a value by dotted key (e.g. `pipeline.batch_size`).
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = toml::Value::try_from(self.redacted()).map_err(|e| CuratorError::ConfigParse {
            message: e.to_string(),
        })?;

        let mut current = &root;
        for part in key.split('.') {
            current = current.get(part).ok_or_else(|| CuratorError::ConfigInvalidValue {
                key: key.to_string(),
                message: "no such configuration key".to_string(),
            })?;
        }

        Ok(match current {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(_) => toml::to_string_pretty(current).map_err(|e| {
                CuratorError::ConfigParse {
                    message: e.to_string(),
                }
            })?,
            other => other.to_string(),
        })
    }

    /// The effective configuration as TOML, with secrets masked.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.redacted()).map_err(|e| CuratorError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// A full configuration file with every default spelled out.
    pub fn dump_template() -> String {
        let body = toml::to_string_pretty(&Config::default()).unwrap_or_default();
        format!(
            "# speech-curator configuration\n\
             # Every key is optional; missing keys use the values shown here.\n\
             # SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY are best set in the environment.\n\n{}",
            body
        )
    }

    fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if !copy.storage.service_role_key.is_empty() {
            copy.storage.service_role_key = "<redacted>".to_string();
        }
        copy
    }
}

fn invalid(key: &str, message: &str) -> CuratorError {
    CuratorError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| CuratorError::ConfigInvalidValue {
        key: name.to_string(),
        message: format!("'{}' is not valid: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.max_workers, 4);
        assert_eq!(config.segmenter.min_chunk_secs, 5.0);
        assert_eq!(config.segmenter.max_chunk_secs, 15.0);
        assert_eq!(config.quality.wer_threshold, 0.15);
        assert_eq!(config.stt.model, defaults::DEFAULT_MODEL);
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.storage.backend, StorageBackend::Supabase);
        assert_eq!(config.storage.bucket, "audio_chunks");
        assert_eq!(config.storage.table, "speech_chunks");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [pipeline]
            batch_size = 32
            max_workers = 8

            [segmenter]
            min_chunk_secs = 3.0

            [quality]
            wer_threshold = 0.2

            [storage]
            backend = "directory"
            output_dir = "/tmp/curated"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.pipeline.batch_size, 32);
        assert_eq!(config.pipeline.max_workers, 8);
        assert_eq!(config.segmenter.min_chunk_secs, 3.0);
        // Unset keys keep their defaults
        assert_eq!(config.segmenter.max_chunk_secs, 15.0);
        assert_eq!(config.quality.wer_threshold, 0.2);
        assert_eq!(config.storage.backend, StorageBackend::Directory);
        assert_eq!(config.storage.output_dir, PathBuf::from("/tmp/curated"));
        assert_eq!(config.vad, VadConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let result = Config::load(Path::new("/nonexistent/speech-curator.toml"));
        assert!(matches!(result, Err(CuratorError::ConfigFileNotFound { .. })));
    }

    #[test]
    fn test_load_or_default_falls_back_when_missing() {
        let config = Config::load_or_default(Path::new("/nonexistent/speech-curator.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[pipeline\nbatch_size = ").unwrap();

        assert!(matches!(
            Config::load_or_default(temp_file.path()),
            Err(CuratorError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_apply() {
        let config = Config::default()
            .with_overrides_from(lookup(&[
                ("BATCH_SIZE", "25"),
                ("MAX_WORKERS", "2"),
                ("WER_THRESHOLD", "0.3"),
                ("SUPABASE_URL", "https://proj.supabase.co"),
                ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
                ("CURATOR_MODEL", "/models/ggml-small.en.bin"),
                ("CURATOR_LANGUAGE", "auto"),
            ]))
            .unwrap();

        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.pipeline.max_workers, 2);
        assert_eq!(config.quality.wer_threshold, 0.3);
        assert_eq!(config.storage.url, "https://proj.supabase.co");
        assert_eq!(config.storage.service_role_key, "secret");
        assert_eq!(config.stt.model, "/models/ggml-small.en.bin");
        assert_eq!(config.stt.language, "auto");
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let config = Config::default()
            .with_overrides_from(lookup(&[("BATCH_SIZE", ""), ("CURATOR_MODEL", "  ")]))
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unparsable_override_is_invalid_value() {
        let result = Config::default().with_overrides_from(lookup(&[("MAX_WORKERS", "four")]));
        match result {
            Err(CuratorError::ConfigInvalidValue { key, message }) => {
                assert_eq!(key, "MAX_WORKERS");
                assert!(message.contains("four"));
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_read_process_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        // SAFETY: ENV_LOCK serializes every test touching the environment.
        unsafe { std::env::set_var("CURATOR_LANGUAGE", "de") };

        let config = Config::default().with_env_overrides();

        unsafe { std::env::remove_var("CURATOR_LANGUAGE") };
        assert_eq!(config.unwrap().stt.language, "de");
    }

    fn rejected_key(mutate: impl FnOnce(&mut Config)) -> String {
        let mut config = Config::default();
        mutate(&mut config);
        match config.validate() {
            Err(CuratorError::ConfigInvalidValue { key, .. }) => key,
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_eq!(rejected_key(|c| c.pipeline.batch_size = 0), "pipeline.batch_size");
        assert_eq!(rejected_key(|c| c.pipeline.max_workers = 0), "pipeline.max_workers");
        assert_eq!(
            rejected_key(|c| c.segmenter.min_chunk_secs = 0.0),
            "segmenter.min_chunk_secs"
        );
        assert_eq!(
            rejected_key(|c| c.segmenter.max_chunk_secs = 4.0),
            "segmenter.max_chunk_secs"
        );
        assert_eq!(
            rejected_key(|c| c.quality.wer_threshold = -0.1),
            "quality.wer_threshold"
        );
        assert_eq!(rejected_key(|c| c.vad.threshold = 1.5), "vad.threshold");
        assert_eq!(rejected_key(|c| c.vad.frame_ms = 0), "vad.frame_ms");
    }

    #[test]
    fn test_get_value_by_path() {
        let config = Config::default();
        assert_eq!(config.get_value_by_path("pipeline.batch_size").unwrap(), "10");
        assert_eq!(config.get_value_by_path("storage.backend").unwrap(), "supabase");
        assert_eq!(config.get_value_by_path("quality.wer_threshold").unwrap(), "0.15");
        assert!(
            config
                .get_value_by_path("segmenter")
                .unwrap()
                .contains("max_chunk_secs = 15.0")
        );
        assert!(config.get_value_by_path("pipeline.nope").is_err());
    }

    #[test]
    fn test_display_masks_service_role_key() {
        let mut config = Config::default();
        config.storage.service_role_key = "super-secret".to_string();

        let shown = config.to_display_toml().unwrap();
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<redacted>"));
        assert_eq!(
            config.get_value_by_path("storage.service_role_key").unwrap(),
            "<redacted>"
        );
    }

    #[test]
    fn test_dump_template_parses_back_to_defaults() {
        let template = Config::dump_template();
        assert!(template.starts_with("# speech-curator configuration"));
        let parsed: Config = toml::from_str(&template).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        if let Ok(path) = Config::default_path() {
            assert!(path.ends_with("speech-curator/config.toml"));
        }
    }
}
