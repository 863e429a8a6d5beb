//! Error types for the filings indexing and retrieval core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for indexing and retrieval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the indexing and retrieval core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query rejected before it reached the index
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding service failed in a way worth retrying (rate limit, 5xx, network)
    #[error("Embedding service temporarily unavailable: {0}")]
    TransientService(String),

    /// Embedding service rejected the request permanently
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// A batch could not be embedded within the retry budget
    #[error("Embedding batch {batch_index} failed after {attempts} attempt(s): {message}")]
    BatchFailed {
        batch_index: usize,
        attempts: u32,
        message: String,
    },

    /// Embedding call exceeded its deadline
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Vector has a different dimension than the index
    #[error("Vector dimension mismatch: index uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Fingerprint registry error
    #[error("Fingerprint registry error: {0}")]
    Registry(String),

    /// Registry and index disagree in a way reconciliation cannot repair
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Document store error
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// Document could not be read or has no usable text
    #[error("Malformed document '{location}': {reason}")]
    MalformedDocument { location: String, reason: String },

    /// Answer generation error
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a transient service error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientService(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex(message.into())
    }

    /// Create a registry error
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry(message.into())
    }

    /// Create a document store error
    pub fn document_store(message: impl Into<String>) -> Self {
        Self::DocumentStore(message.into())
    }

    /// Create a malformed document error
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::TransientService(_) | Error::Timeout(_) => true,
            Error::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}
