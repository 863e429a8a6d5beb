//! Query-time retrieval: embed, search, floor, per-filing cap

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::providers::{ScoredChunk, VectorIndex};
use crate::types::{DocumentRef, Query, RetrievalHit};

/// Retriever producing grounded passages for a question
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<Embedder>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedder,
            index,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ranked passages for `query`, best first
    ///
    /// An empty result means nothing cleared the similarity floor under
    /// the query's filters; it is not an error. Failing to embed the
    /// question is.
    pub async fn answer_context(&self, query: &Query) -> Result<Vec<RetrievalHit>> {
        let question = query.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuery("question is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(question).await?;

        let mut filter = query.filter();
        if query.most_recent {
            match self.index.latest_published_date(&filter).await? {
                Some(latest) => filter = filter.on_date(latest),
                None => {
                    tracing::debug!("No filings match the query filters");
                    return Ok(Vec::new());
                }
            }
        }

        // Widen until top_k capped hits are found, the filtered index is
        // exhausted, or the ranked list has dropped below the floor.
        let mut width = self.config.search_width();
        loop {
            let candidates = self.index.search(&query_vector, width, &filter).await?;
            let candidate_count = candidates.len();
            let below_floor = candidates
                .last()
                .map_or(true, |c| c.score < self.config.min_similarity);

            let hits = self.select(candidates);
            if hits.len() >= self.config.top_k || candidate_count < width || below_floor {
                tracing::info!(
                    "Retrieved {} passages from {} candidates (floor {})",
                    hits.len(),
                    candidate_count,
                    self.config.min_similarity
                );
                return Ok(hits);
            }

            tracing::debug!(
                "Per-filing cap left {} of {} passages, widening search beyond {}",
                hits.len(),
                self.config.top_k,
                width
            );
            width = width.saturating_mul(2);
        }
    }

    /// Apply the similarity floor and per-filing cap to ranked candidates
    fn select(&self, candidates: Vec<ScoredChunk>) -> Vec<RetrievalHit> {
        let mut per_document: HashMap<DocumentRef, usize> = HashMap::new();
        candidates
            .into_iter()
            .filter(|c| c.score >= self.config.min_similarity)
            .filter(|c| {
                let taken = per_document.entry(c.chunk.document.clone()).or_insert(0);
                *taken += 1;
                *taken <= self.config.max_chunks_per_document
            })
            .take(self.config.top_k)
            .map(|c| RetrievalHit::from_chunk(c.chunk, c.score))
            .collect()
    }
}
