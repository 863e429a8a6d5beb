//! Result types returned to the orchestration layer

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Chunk, ContentHash};

/// One grounded passage of a retrieval result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// Passage text
    pub text: String,
    /// Cosine similarity to the question
    pub score: f32,
    pub source_url: String,
    pub entity_id: String,
    pub doc_type: String,
    pub published_date: NaiveDate,
    /// Dedup key of the passage
    pub content_hash: ContentHash,
    /// Character span in the source filing
    pub offset_start: usize,
    pub offset_end: usize,
}

impl RetrievalHit {
    /// Build a hit from an indexed chunk and its score
    pub fn from_chunk(chunk: Chunk, score: f32) -> Self {
        Self {
            text: chunk.text,
            score,
            source_url: chunk.document.source_url,
            entity_id: chunk.document.entity_id,
            doc_type: chunk.document.doc_type,
            published_date: chunk.document.published_date,
            content_hash: chunk.content_hash,
            offset_start: chunk.offset_start,
            offset_end: chunk.offset_end,
        }
    }
}

/// A batch that could not be embedded or stored during an indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Position of the batch within the run
    pub batch_index: usize,
    /// Chunks left unindexed (they stay unmarked and are retried next run)
    pub chunk_count: usize,
    pub error: String,
}

/// Summary counters for one indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingReport {
    pub run_id: Uuid,
    /// Documents that produced at least one chunk
    pub documents_processed: usize,
    /// Documents with no usable text
    pub documents_empty: usize,
    /// Entries the document store could not read as filings
    pub documents_malformed: usize,
    /// Chunks embedded and committed in this run
    pub chunks_embedded: usize,
    /// Chunks already present (or repeated within this run)
    pub chunks_skipped: usize,
    /// Chunks in failed batches
    pub chunks_failed: usize,
    /// Chunks committed to the index whose fingerprints could not be
    /// written; they are marked by reconciliation, never re-embedded
    pub chunks_unmarked: usize,
    pub failed_batches: Vec<BatchFailure>,
}

impl IndexingReport {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            documents_processed: 0,
            documents_empty: 0,
            documents_malformed: 0,
            chunks_embedded: 0,
            chunks_skipped: 0,
            chunks_failed: 0,
            chunks_unmarked: 0,
            failed_batches: Vec::new(),
        }
    }

    /// True when every batch of the run was committed
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

/// Repairs made while reconciling the fingerprint set against the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Fingerprints with no index record, removed so the chunk is re-embedded
    pub purged: usize,
    /// Index records with no fingerprint, marked without re-embedding
    pub healed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.purged == 0 && self.healed == 0
    }
}

/// Sizes of the persisted state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub indexed_chunks: usize,
    pub fingerprints: usize,
    pub dimensions: Option<usize>,
}
