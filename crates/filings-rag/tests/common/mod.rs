//! Shared fixtures for service-level tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use filings_rag::config::{ChunkingConfig, EmbeddingConfig, RetrievalConfig, StorageConfig};
use filings_rag::generation::Citation;
use filings_rag::providers::{AnswerGenerator, DocumentStore, EmbeddingProvider};
use filings_rag::{Document, RagConfig, RagService, Result};

const DIMENSIONS: usize = 256;

/// Bag-of-words embedder that counts the texts it embeds
#[derive(Default)]
pub struct CountingEmbedder {
    texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

fn slot(word: &str) -> usize {
    let hash = word.to_lowercase().bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    });
    1 + (hash % (DIMENSIONS as u64 - 1)) as usize
}

pub fn vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMENSIONS];
    v[0] = 0.05;
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        v[slot(word)] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| vector(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(DIMENSIONS)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Generator that echoes how much context it was given
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, question: &str, context: &str, citations: &[Citation]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{} ({} passages, {} chars)",
            question,
            citations.len(),
            context.len()
        ))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub fn config(data_dir: &Path) -> RagConfig {
    RagConfig {
        chunking: ChunkingConfig {
            max_chars: 2000,
            overlap_chars: 200,
        },
        embeddings: EmbeddingConfig {
            batch_size: 3,
            max_concurrency: 2,
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            request_timeout_secs: 5,
        },
        retrieval: RetrievalConfig {
            top_k: 5,
            candidate_pool: 25,
            min_similarity: 0.3,
            max_chunks_per_document: 2,
        },
        storage: StorageConfig::in_dir(data_dir),
        ..RagConfig::default()
    }
}

pub async fn open(
    data_dir: &Path,
    embedder: Arc<CountingEmbedder>,
    store: Arc<dyn DocumentStore>,
) -> RagService {
    filings_rag::telemetry::init_tracing(Some("filings_rag=debug"));
    RagService::open(config(data_dir), embedder, store)
        .await
        .expect("service opens")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn filing(entity: &str, doc_type: &str, published: NaiveDate, text: &str) -> Document {
    Document::new(
        entity,
        doc_type,
        published,
        format!("https://filings.example.com/{}/{}/{}", entity, doc_type, published),
        text,
    )
}

/// A 12,000 character filing
pub fn long_filing(entity: &str) -> Document {
    filing(entity, "10-K", date(2024, 2, 1), &"lorem ".repeat(2000))
}
