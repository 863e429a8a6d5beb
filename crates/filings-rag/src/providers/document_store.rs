//! Document store provider trait for pulling cleaned filings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Document;

/// Documents published since a marker
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    /// Filings to index
    pub documents: Vec<Document>,
    /// Marker to pass on the next call; `None` when nothing was consumed
    pub next_marker: Option<String>,
    /// Entries that could not be read as filings
    pub skipped: usize,
}

/// Trait for the store that hands cleaned filings to the indexer
///
/// Markers are opaque to callers. A store must return every document
/// it has not yet handed out for the given marker; returning a document
/// twice is harmless because chunks are deduplicated downstream.
///
/// Implementations:
/// - `DirectoryDocumentStore`: cleaned filing JSON files on disk
/// - `MemoryDocumentStore`: in-process submission log
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents newer than `since_marker` (everything when `None`)
    async fn list_new_documents(&self, since_marker: Option<&str>) -> Result<DocumentBatch>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
