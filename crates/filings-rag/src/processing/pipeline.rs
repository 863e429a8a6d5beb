//! Incremental indexing coordinator
//!
//! Documents are chunked, chunks already in the fingerprint registry
//! are skipped, and the rest are embedded in concurrent batches. Each
//! batch is committed as soon as it is embedded: records are added to
//! the index first and fingerprinted only after the add is durable, so
//! a crash in between leaves an unmarked record that reconciliation
//! heals rather than a fingerprint with nothing behind it.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::ingestion::TextChunker;
use crate::providers::{AddOutcome, DocumentStore, EmbeddingRecord, VectorIndex};
use crate::storage::FingerprintRegistry;
use crate::types::{BatchFailure, Chunk, Document, IndexingReport, ReconcileReport};

use super::reconcile::reconcile;

/// Indexing pipeline shared by every indexing run of a service
pub struct IndexingPipeline {
    chunker: TextChunker,
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    registry: Arc<FingerprintRegistry>,
    /// Single-writer lock around index add + fingerprint mark
    write_lock: Mutex<()>,
    /// Serializes pulls from the document store so the cursor only moves forward
    pull_lock: Mutex<()>,
    /// Set when a batch reached the index but its fingerprints were not written
    needs_reconcile: AtomicBool,
}

/// Result of committing one embedded batch
struct Committed {
    outcome: AddOutcome,
    marked: bool,
}

impl IndexingPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
        registry: Arc<FingerprintRegistry>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            registry,
            write_lock: Mutex::new(()),
            pull_lock: Mutex::new(()),
            needs_reconcile: AtomicBool::new(false),
        }
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Pull new documents from the store and index them
    ///
    /// The store cursor is saved only when every batch was committed;
    /// otherwise the same documents are listed again next time and their
    /// already-committed chunks are skipped.
    pub async fn index_new_documents(&self, store: &dyn DocumentStore) -> Result<IndexingReport> {
        let _pull = self.pull_lock.lock().await;

        let since = self.registry.marker()?;
        let batch = store.list_new_documents(since.as_deref()).await?;
        tracing::info!(
            "Pulled {} documents from {} (marker: {})",
            batch.documents.len(),
            store.name(),
            since.as_deref().unwrap_or("none")
        );

        let mut report = self.index_documents(&batch.documents).await?;
        report.documents_malformed = batch.skipped;

        match batch.next_marker {
            Some(marker) if report.is_complete() => self.registry.set_marker(&marker)?,
            Some(_) => tracing::warn!(
                "Run {} had {} failed batches, keeping document store marker",
                report.run_id,
                report.failed_batches.len()
            ),
            None => {}
        }

        Ok(report)
    }

    /// Index the given documents
    ///
    /// Failed batches are reported and left unmarked; they never abort
    /// the run or roll back batches that were already committed.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexingReport> {
        if self.needs_reconcile.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.reconcile().await {
                self.needs_reconcile.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }

        let mut report = IndexingReport::new();
        let pending = self.select_pending(documents, &mut report)?;

        tracing::info!(
            "Run {}: {} documents, {} chunks to embed with {}, {} already indexed",
            report.run_id,
            report.documents_processed,
            pending.len(),
            self.embedder.provider_name(),
            report.chunks_skipped
        );

        if pending.is_empty() {
            return Ok(report);
        }

        let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();
        let batches = self.embedder.plan_batches(pending.len());
        let max_concurrency = self.embedder.config().max_concurrency;

        let mut embedded = pin!(stream::iter(batches.into_iter().enumerate())
            .map(|(batch_index, range)| {
                let texts = &texts[range.clone()];
                async move {
                    let result = self.embedder.embed_with_retry(batch_index, texts).await;
                    (batch_index, range, result)
                }
            })
            .buffered(max_concurrency));

        while let Some((batch_index, range, result)) = embedded.next().await {
            let chunks = &pending[range];
            let committed = match result {
                Ok(vectors) => self.commit(chunks, vectors).await,
                Err(e) => Err(e),
            };

            match committed {
                Ok(Committed { outcome, marked }) => {
                    report.chunks_embedded += outcome.inserted.len();
                    report.chunks_skipped += outcome.duplicates.len();
                    if !marked {
                        report.chunks_unmarked += outcome.inserted.len() + outcome.duplicates.len();
                    }
                }
                Err(e) => {
                    tracing::error!("Run {}: batch {} not indexed: {}", report.run_id, batch_index, e);
                    report.chunks_failed += chunks.len();
                    report.failed_batches.push(BatchFailure {
                        batch_index,
                        chunk_count: chunks.len(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Run {} finished: {} embedded, {} skipped, {} failed, {} unmarked",
            report.run_id,
            report.chunks_embedded,
            report.chunks_skipped,
            report.chunks_failed,
            report.chunks_unmarked
        );
        Ok(report)
    }

    /// Repair registry/index disagreement under the write lock
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _writer = self.write_lock.lock().await;
        reconcile(&self.registry, self.index.as_ref()).await
    }

    /// Chunk documents and keep chunks not yet fingerprinted or seen in this run
    fn select_pending(&self, documents: &[Document], report: &mut IndexingReport) -> Result<Vec<Chunk>> {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for document in documents {
            let chunks = self.chunker.chunk(document);
            if chunks.is_empty() {
                tracing::warn!(
                    "Skipping {} {} {}: no text to index",
                    document.entity_id,
                    document.doc_type,
                    document.published_date
                );
                report.documents_empty += 1;
                continue;
            }
            report.documents_processed += 1;

            for chunk in chunks {
                if !seen.insert(chunk.content_hash.clone()) || self.registry.exists(&chunk.content_hash)? {
                    report.chunks_skipped += 1;
                    continue;
                }
                pending.push(chunk);
            }
        }

        Ok(pending)
    }

    /// Add one embedded batch to the index, then fingerprint it
    ///
    /// Once the add has committed the batch is never reported as failed:
    /// a failed mark leaves unmarked records for reconciliation to heal.
    async fn commit(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<Committed> {
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::new(chunk, vector))
            .collect();

        let _writer = self.write_lock.lock().await;
        let outcome = self.index.add(records).await?;
        let marked = match self.registry.mark_many(outcome.present()) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    "{} indexed chunks could not be fingerprinted ({}), healing before next run",
                    outcome.inserted.len() + outcome.duplicates.len(),
                    e
                );
                self.needs_reconcile.store(true, Ordering::SeqCst);
                false
            }
        };
        Ok(Committed { outcome, marked })
    }
}
