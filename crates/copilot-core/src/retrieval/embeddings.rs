//! ============================================================================
//! Embedding Gateway - Text to vector via an OpenAI-compatible API
//! ============================================================================
//! Turns user text into a fixed-length vector. Stateless apart from the
//! HTTP client; no retries are attempted here.
//! ============================================================================

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CopilotConfig;
use crate::types::CopilotError;

/// Default embedding model (OpenAI compatible)
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Expected embedding dimension for text-embedding-3-small
pub const EMBEDDING_DIM: usize = 1536;

/// Text → vector capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single non-empty text.
    ///
    /// Blank input fails with [`CopilotError::InvalidQuery`] before any
    /// upstream call; every upstream problem is [`CopilotError::EmbeddingUnavailable`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CopilotError>;

    /// Dimensionality of every vector this embedder returns
    fn dimension(&self) -> usize;
}

/// Embedding client for OpenAI-compatible `/embeddings` endpoints
pub struct EmbeddingService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl EmbeddingService {
    /// Create a service against the public OpenAI API
    pub fn new_openai(api_key: String) -> Self {
        Self::new_custom(
            api_key,
            "https://api.openai.com/v1".to_string(),
            DEFAULT_EMBEDDING_MODEL.to_string(),
            EMBEDDING_DIM,
        )
    }

    /// Create with custom base URL, model and dimension
    pub fn new_custom(api_key: String, base_url: String, model: String, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
            dimension,
        }
    }

    /// Build from configuration, bounding every request by the upstream timeout
    pub fn from_config(config: &CopilotConfig) -> Result<Self, CopilotError> {
        let api_key = config.require_api_key()?.to_string();
        let client = build_client(config.upstream_timeout)
            .map_err(|e| CopilotError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dim,
        })
    }

    /// Generate embeddings for multiple texts, in input order
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send embedding request: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(anyhow!(
                    "Embedding API error ({}): {}",
                    status,
                    error.error.message
                ));
            }
            return Err(anyhow!("Embedding API error ({})", status));
        }

        let embedding_response: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse embedding response: {}", e))?;

        if let Some(usage) = &embedding_response.usage {
            debug!(
                "Embedding tokens used: {} (model: {})",
                usage.total_tokens, embedding_response.model
            );
        }

        Ok(order_by_index(embedding_response.data))
    }

    /// Get the current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CopilotError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CopilotError::InvalidQuery(
                "Cannot embed empty text".to_string(),
            ));
        }

        let embeddings = self
            .embed_batch(&[text.to_string()])
            .await
            .map_err(|e| CopilotError::EmbeddingUnavailable(e.to_string()))?;

        let vector = embeddings.into_iter().next().ok_or_else(|| {
            CopilotError::EmbeddingUnavailable("No embedding returned".to_string())
        })?;

        check_dimension(vector, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Shared reqwest client with a request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
}

fn order_by_index(data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    let mut embeddings: Vec<(usize, Vec<f32>)> =
        data.into_iter().map(|d| (d.index, d.embedding)).collect();
    embeddings.sort_by_key(|(idx, _)| *idx);
    embeddings.into_iter().map(|(_, e)| e).collect()
}

fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, CopilotError> {
    if vector.len() != expected {
        return Err(CopilotError::EmbeddingUnavailable(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(vector)
}
