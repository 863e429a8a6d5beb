//! Service facade exposed to the orchestration layer

use std::sync::Arc;

use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::generation::{citations, distinct_sources, Answer, PromptBuilder, MAX_SOURCES};
use crate::ingestion::TextChunker;
use crate::processing::IndexingPipeline;
use crate::providers::{
    AnswerGenerator, DocumentStore, EmbeddingProvider, LocalVectorIndex, OpenAiEmbedder,
    VectorIndex,
};
use crate::retrieval::Retriever;
use crate::storage::FingerprintRegistry;
use crate::types::{Document, IndexStats, IndexingReport, Query, ReconcileReport, RetrievalHit};

/// Incremental indexing and grounded retrieval over filings
///
/// Indexing runs and queries may be issued concurrently from several
/// tasks; index writes are serialized internally.
pub struct RagService {
    config: RagConfig,
    pipeline: IndexingPipeline,
    retriever: Retriever,
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    registry: Arc<FingerprintRegistry>,
    document_store: Arc<dyn DocumentStore>,
    answer_generator: Option<Arc<dyn AnswerGenerator>>,
    startup_reconcile: ReconcileReport,
}

impl RagService {
    /// Open persistent state under `config.storage` and reconcile it
    pub async fn open(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        document_store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage.data_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create data directory {}: {}",
                config.storage.data_dir.display(),
                e
            ))
        })?;

        let index = Arc::new(LocalVectorIndex::open(config.storage.index_path())?);
        let registry = Arc::new(FingerprintRegistry::new(config.storage.fingerprint_path())?);

        Self::from_parts(config, embedding_provider, index, registry, document_store).await
    }

    /// Open with the OpenAI-compatible embedding client from `config.service`
    pub async fn open_with_openai(
        config: RagConfig,
        document_store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let embedder = OpenAiEmbedder::from_config(&config.service, config.embeddings.request_timeout())?;
        Self::open(config, Arc::new(embedder), document_store).await
    }

    /// Wire already opened components and reconcile them
    pub async fn from_parts(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        registry: Arc<FingerprintRegistry>,
        document_store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            "Opening filings RAG service (embeddings: {}, index: {}, documents: {})",
            embedding_provider.name(),
            index.name(),
            document_store.name()
        );

        let embedder = Arc::new(Embedder::new(embedding_provider, config.embeddings.clone())?);
        let chunker = TextChunker::from_config(&config.chunking)?;
        let pipeline = IndexingPipeline::new(chunker, embedder.clone(), index.clone(), registry.clone());
        let retriever = Retriever::new(embedder.clone(), index.clone(), config.retrieval.clone())?;

        let startup_reconcile = pipeline.reconcile().await?;
        if !startup_reconcile.is_clean() {
            tracing::warn!(
                "Startup reconciliation repaired state: {} purged, {} healed",
                startup_reconcile.purged,
                startup_reconcile.healed
            );
        }

        Ok(Self {
            config,
            pipeline,
            retriever,
            embedder,
            index,
            registry,
            document_store,
            answer_generator: None,
            startup_reconcile,
        })
    }

    /// Attach the generator used by [`RagService::ask`]
    pub fn with_answer_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.answer_generator = Some(generator);
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Repairs made when the service was opened
    pub fn startup_reconcile(&self) -> &ReconcileReport {
        &self.startup_reconcile
    }

    /// Index whatever the document store reports as new
    pub async fn index_new_documents(&self) -> Result<IndexingReport> {
        self.pipeline
            .index_new_documents(self.document_store.as_ref())
            .await
    }

    /// Index the given documents directly
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexingReport> {
        self.pipeline.index_documents(documents).await
    }

    /// Retrieve passages for a question with optional filters
    pub async fn query(
        &self,
        question: &str,
        entity_id: Option<&str>,
        doc_type: Option<&str>,
        most_recent: bool,
    ) -> Result<Vec<RetrievalHit>> {
        let mut query = Query::new(question);
        if let Some(entity_id) = entity_id {
            query = query.entity(entity_id);
        }
        if let Some(doc_type) = doc_type {
            query = query.doc_type(doc_type);
        }
        if most_recent {
            query = query.most_recent();
        }
        self.search(&query).await
    }

    /// Retrieve passages for a prepared query
    pub async fn search(&self, query: &Query) -> Result<Vec<RetrievalHit>> {
        self.retriever.answer_context(query).await
    }

    /// Retrieve and, when anything relevant was found, generate an answer
    ///
    /// An empty retrieval result declines without calling the generator.
    pub async fn ask(&self, query: &Query) -> Result<Answer> {
        let hits = self.search(query).await?;
        if hits.is_empty() {
            return Ok(Answer::Declined {
                reason: "No indexed filing passage is relevant enough to answer this question"
                    .to_string(),
            });
        }

        let generator = self
            .answer_generator
            .as_ref()
            .ok_or_else(|| Error::Generation("No answer generator configured".to_string()))?;

        let context = PromptBuilder::build_context(&hits);
        let citations = citations(&hits);
        let text = generator
            .generate(query.question.trim(), &context, &citations)
            .await?;

        tracing::info!(
            "Answered with {} via {} passages",
            generator.name(),
            citations.len()
        );
        Ok(Answer::Grounded {
            text,
            sources: distinct_sources(&hits, MAX_SOURCES),
            citations,
        })
    }

    /// Reconcile the fingerprint registry against the index now
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.pipeline.reconcile().await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            indexed_chunks: self.index.len().await?,
            fingerprints: self.registry.len()?,
            dimensions: self.index.dimensions().await?,
        })
    }

    /// Whether the embedding service answers
    pub async fn health_check(&self) -> Result<bool> {
        self.embedder.health_check().await
    }
}
