//! Configuration for the indexing and retrieval core

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration, validated once and handed to each component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Batching and retry behaviour around the embedding service
    pub embeddings: EmbeddingConfig,
    /// Embedding service endpoint
    pub service: EmbeddingServiceConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Persistent state locations
    pub storage: StorageConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.embeddings.validate()?;
        self.service.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chars: usize,
    /// Characters of trailing context repeated at the start of the next chunk
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap_chars: 150,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(Error::config("chunking.max_chars must be greater than 0"));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(Error::Config(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Batching, concurrency and retry settings for embedding calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Texts per embedding request
    pub batch_size: usize,
    /// Embedding requests in flight at once
    pub max_concurrency: usize,
    /// Attempts per batch, including the first
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for the retry delay in milliseconds
    pub max_backoff_ms: u64,
    /// Deadline for a single embedding request in seconds
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            max_concurrency: 4,
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            request_timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("embeddings.batch_size must be greater than 0"));
        }
        if self.max_concurrency == 0 {
            return Err(Error::config(
                "embeddings.max_concurrency must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("embeddings.max_attempts must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config(
                "embeddings.request_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Deadline applied to each embedding request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before retry number `retry` (1-based), doubling up to the cap
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// OpenAI-compatible embedding endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingServiceConfig {
    /// Base URL (the `/embeddings` path is appended)
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Environment variable holding the API key (may be unset for local servers)
    pub api_key_env: String,
    /// Requested output dimensions, if the model supports shortening
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: None,
        }
    }
}

impl EmbeddingServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config("service.model must not be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::config("service.base_url must not be empty"));
        }
        if self.dimensions == Some(0) {
            return Err(Error::config("service.dimensions must be greater than 0"));
        }
        Ok(())
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages returned per query
    pub top_k: usize,
    /// Candidates fetched from the index before floor and per-document cap
    pub candidate_pool: usize,
    /// Minimum cosine similarity for a passage to be returned
    pub min_similarity: f32,
    /// Passages allowed from one document
    pub max_chunks_per_document: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            candidate_pool: 25,
            min_similarity: 0.2,
            max_chunks_per_document: 3,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be greater than 0"));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(Error::Config(format!(
                "retrieval.min_similarity must be within [-1, 1], got {}",
                self.min_similarity
            )));
        }
        if self.max_chunks_per_document == 0 {
            return Err(Error::config(
                "retrieval.max_chunks_per_document must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Number of index candidates to fetch for one query
    pub fn search_width(&self) -> usize {
        self.candidate_pool.max(self.top_k)
    }
}

/// Locations of the persisted index and fingerprint set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding both databases
    pub data_dir: PathBuf,
    /// Vector index database file name
    pub index_file: String,
    /// Fingerprint registry database file name
    pub fingerprint_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("filings-rag");

        Self {
            data_dir,
            index_file: "vectors.db".to_string(),
            fingerprint_file: "fingerprints.db".to_string(),
        }
    }
}

impl StorageConfig {
    /// Store everything under `data_dir` with default file names
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.data_dir.join(&self.fingerprint_file)
    }
}
