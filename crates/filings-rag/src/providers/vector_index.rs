//! Vector index provider trait for storing and searching embeddings

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

use crate::error::Result;
use crate::types::{Chunk, ContentHash, SearchFilter};

/// An embedded chunk ready to be added to the index
///
/// The chunk carries the metadata snapshot (provenance, offsets, text)
/// stored next to the vector.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.chunk.content_hash
    }
}

/// Search result from the vector index
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub score: f32,
}

/// What an `add` call did with each record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    /// Newly stored records
    pub inserted: Vec<ContentHash>,
    /// Records dropped because their hash was already indexed
    pub duplicates: Vec<ContentHash>,
}

impl AddOutcome {
    /// Every hash of the call, all of which are now present in the index
    pub fn present(&self) -> impl Iterator<Item = &ContentHash> {
        self.inserted.iter().chain(self.duplicates.iter())
    }
}

/// Trait for vector storage and similarity search
///
/// Similarity is cosine similarity. Results are ordered by descending
/// score, then more recent `published_date`, then content hash.
/// Adding a content hash that is already indexed is silently dropped
/// and reported in [`AddOutcome::duplicates`].
///
/// Implementations:
/// - `LocalVectorIndex`: SQLite-backed store with an in-memory snapshot
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Durably add records; readers see either none or all of them
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<AddOutcome>;

    /// Up to `k` nearest records passing `filter`
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>>;

    /// Latest published date among records passing `filter`
    async fn latest_published_date(&self, filter: &SearchFilter) -> Result<Option<NaiveDate>>;

    /// Whether a record with this hash exists
    async fn contains(&self, hash: &ContentHash) -> Result<bool>;

    /// All indexed content hashes
    async fn content_hashes(&self) -> Result<HashSet<ContentHash>>;

    /// Get total number of records stored
    async fn len(&self) -> Result<usize>;

    /// Check if the index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Vector dimension, once the first record is stored
    async fn dimensions(&self) -> Result<Option<usize>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
