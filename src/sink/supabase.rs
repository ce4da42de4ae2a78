//! Supabase sink: Storage bucket for audio, PostgREST table for metadata.
//!
//! Talks to the two REST endpoints directly with a blocking reqwest client.
//! The service role key goes in both the `Authorization` and `apikey`
//! headers, which lets bulk ingestion bypass row level security.

use super::{ChunkSink, PersistReceipt, SpeechChunkRow, new_chunk_id, storage_path};
use crate::audio::wav::encode_wav;
use crate::defaults;
use crate::error::{CuratorError, Result};
use crate::pipeline::record::ChunkRecord;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

/// Connection settings for a Supabase project.
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub bucket: String,
    pub table: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("table", &self.table)
            .finish()
    }
}

impl SupabaseConfig {
    /// Settings with the default bucket and table.
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_role_key: service_role_key.into(),
            bucket: defaults::STORAGE_BUCKET.to_string(),
            table: defaults::METADATA_TABLE.to_string(),
        }
    }

    fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

pub struct SupabaseSink {
    client: Client,
    config: SupabaseConfig,
}

impl std::fmt::Debug for SupabaseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSink")
            .field("config", &self.config)
            .finish()
    }
}

impl SupabaseSink {
    /// Build a sink. Fails fast when either credential is empty.
    ///
    /// Creates a blocking HTTP client, so call this off the async runtime.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CuratorError::MissingCredential {
                name: "SUPABASE_URL".to_string(),
                hint: "set it in the environment or as storage.url in the config file"
                    .to_string(),
            });
        }
        if config.service_role_key.trim().is_empty() {
            return Err(CuratorError::MissingCredential {
                name: "SUPABASE_SERVICE_ROLE_KEY".to_string(),
                hint: "set it in the environment or as storage.service_role_key in the config file"
                    .to_string(),
            });
        }

        let client = Client::builder()
            .build()
            .map_err(|e| CuratorError::Persistence {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Public URL of an object in the bucket.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url(),
            self.config.bucket,
            path
        )
    }

    fn upload(&self, path: &str, wav: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url(),
            self.config.bucket,
            path
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .header(CONTENT_TYPE, "audio/wav")
            .body(wav)
            .send()
            .map_err(|e| CuratorError::Persistence {
                message: format!("Failed to upload {path}: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(CuratorError::Persistence {
                message: format!("Upload of {path} failed with status {status}: {body}"),
            });
        }
        Ok(())
    }

    fn insert_row(&self, row: &SpeechChunkRow) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.config.base_url(), self.config.table);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.service_role_key)
            .header("apikey", &self.config.service_role_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .map_err(|e| CuratorError::Persistence {
                message: format!("Failed to insert row {}: {e}", row.id),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(CuratorError::Persistence {
                message: format!("Insert of row {} failed with status {status}: {body}", row.id),
            });
        }
        Ok(())
    }
}

impl ChunkSink for SupabaseSink {
    fn persist(&self, record: &ChunkRecord) -> Result<PersistReceipt> {
        let chunk_id = new_chunk_id();
        let path = storage_path(&record.dataset_id, &chunk_id);
        let audio_url = self.public_url(&path);
        let row = SpeechChunkRow::from_record(record, &chunk_id, &audio_url)?;
        let wav = encode_wav(&record.chunk.samples, record.chunk.sample_rate)?;

        self.upload(&path, wav)?;
        tracing::debug!(path = %path, "uploaded chunk audio");

        // No compensating delete: the object stays and the error names it.
        self.insert_row(&row).map_err(|e| CuratorError::Persistence {
            message: format!(
                "{e} (audio object {}/{path} is orphaned)",
                self.config.bucket
            ),
        })?;

        Ok(PersistReceipt {
            chunk_id,
            audio_url,
        })
    }

    fn name(&self) -> &str {
        "supabase"
    }
}
