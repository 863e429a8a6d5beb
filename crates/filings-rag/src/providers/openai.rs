//! OpenAI-compatible embedding provider

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingServiceConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints
///
/// Works against the hosted API and against local servers that speak
/// the same protocol (Ollama, vLLM, LM Studio). The API key is optional
/// for the latter.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedder {
    /// Build a client, reading the API key from the configured environment variable
    pub fn from_config(config: &EmbeddingServiceConfig, timeout: Duration) -> Result<Self> {
        config.validate()?;
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::new(
            &config.base_url,
            &config.model,
            api_key.as_deref(),
            config.dimensions,
            timeout,
        )
    }

    /// Build a client with explicit settings
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| Error::config("API key contains invalid header characters"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn status_error(status: StatusCode, body: &str) -> Error {
        let message = format!("Embedding request failed ({}): {}", status, body);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Error::TransientService(message)
        } else {
            Error::Embedding(message)
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    Error::TransientService(format!("Embedding request failed: {}", e))
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Self::status_error(status, &body));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Service returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        match self.embed("health check").await {
            Ok(vector) => Ok(!vector.is_empty()),
            Err(e) => {
                tracing::warn!("Embedding service health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
