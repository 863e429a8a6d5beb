//! filings-rag: incremental vector indexing and grounded retrieval over company filings
//!
//! Cleaned filings are split into overlapping chunks, chunks not seen
//! before are embedded through an external embedding service, and the
//! vectors are appended to a persistent SQLite-backed index. A durable
//! fingerprint registry keyed by content hash keeps re-runs from
//! embedding anything twice. Questions are answered from the top
//! passages above a similarity floor, with citations back to the
//! source filing.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::{Answer, Citation};
pub use service::RagService;
pub use types::{
    Chunk, ContentHash, Document, DocumentRef, IndexStats, IndexingReport, Query,
    ReconcileReport, RetrievalHit, SearchFilter,
};
