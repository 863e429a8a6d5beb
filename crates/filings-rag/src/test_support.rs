//! In-process providers for unit tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Document;

pub const DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedder
///
/// Texts sharing words get similar vectors, so similarity ranking
/// behaves predictably without a real model.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub texts_embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        keyword_vector(text)
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSIONS];
    vector[0] = 0.05;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let slot = 1 + (fnv1a(&word.to_lowercase()) % (DIMENSIONS as u64 - 1)) as usize;
        vector[slot] += 1.0;
    }
    vector
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(DIMENSIONS)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

enum Failure {
    /// Transient errors for the first n calls
    First(usize),
    /// Every call fails permanently
    Permanent,
    /// Every call sleeps this long before answering
    Hang(Duration),
    /// Permanent failure for batches containing this word
    Rejecting(String),
}

/// Embedder with scripted failures
pub struct FlakyProvider {
    failure: Failure,
    pub calls: AtomicUsize,
}

impl FlakyProvider {
    fn with(failure: Failure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(n: usize) -> Self {
        Self::with(Failure::First(n))
    }

    pub fn permanent() -> Self {
        Self::with(Failure::Permanent)
    }

    pub fn hanging(delay: Duration) -> Self {
        Self::with(Failure::Hang(delay))
    }

    pub fn rejecting(word: &str) -> Self {
        Self::with(Failure::Rejecting(word.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Failure::First(n) if call < *n => {
                return Err(Error::transient("429 Too Many Requests"));
            }
            Failure::Permanent => return Err(Error::embedding("400 Bad Request")),
            Failure::Hang(delay) => tokio::time::sleep(*delay).await,
            Failure::Rejecting(word) if texts.iter().any(|t| t.contains(word.as_str())) => {
                return Err(Error::embedding(format!("input rejected: {}", word)));
            }
            _ => {}
        }
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(DIMENSIONS)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "flaky"
    }
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
