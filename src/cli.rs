//! Command-line interface for speech-curator
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, StorageBackend};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Quality-gated speech dataset curation
#[derive(Parser, Debug)]
#[command(
    name = "speech-curator",
    version,
    about = "Segment, transcribe, score and persist speech datasets"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Curate every utterance listed in a JSON Lines manifest
    Run(RunArgs),

    /// Print the chunk plan for one WAV file as JSON
    Segment {
        /// WAV file to segment
        #[arg(long, value_name = "FILE")]
        audio: PathBuf,
    },

    /// Score a transcript against its reference
    Score {
        /// Reference text
        #[arg(long)]
        reference: String,

        /// Transcribed text
        #[arg(long)]
        hypothesis: String,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Options of the `run` command. Every flag overrides its config key.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Manifest with one `{"audio", "text", "speaker_id"}` object per line
    #[arg(long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Dataset id stored with every chunk (default: unknown_ds)
    #[arg(long, value_name = "ID")]
    pub dataset_id: Option<String>,

    /// Chunk records per batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Concurrent workers per batch
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Where passing chunks go
    #[arg(long, value_enum, value_name = "BACKEND")]
    pub storage: Option<StorageBackend>,

    /// Output directory for the directory backend
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to the Whisper model file
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Transcription language (e.g. en, de, auto)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply(&self, config: &mut Config) {
        if let Some(n) = self.batch_size {
            config.pipeline.batch_size = n;
        }
        if let Some(n) = self.max_workers {
            config.pipeline.max_workers = n;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(dir) = &self.output_dir {
            config.storage.output_dir = dir.clone();
            // An output directory only makes sense for the directory backend
            if self.storage.is_none() {
                config.storage.backend = StorageBackend::Directory;
            }
        }
        if let Some(model) = &self.model {
            config.stt.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.stt.language = language.clone();
        }
    }
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., pipeline.batch_size)
    Get {
        /// Dotted key path (e.g., stt.model, storage.backend)
        key: String,
    },
    /// Show the effective configuration (file + environment)
    List,
    /// Dump a commented configuration template
    Dump,
}
