//! ============================================================================
//! Core Types for the Support Copilot
//! ============================================================================
//! Data model shared by retrieval, memory and generation, plus the error
//! taxonomy of the chat pipeline. Wire types use the field names the
//! frontend already consumes (`LLM_Response`, `Cited_URLs`).
//! ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single user message entering the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Empty string for anonymous users
    pub user_id: String,
    /// Trimmed, never empty
    pub text: String,
}

impl Query {
    /// Build a query, trimming both fields.
    /// Fails with [`CopilotError::InvalidQuery`] when the text is blank.
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Result<Self, CopilotError> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(CopilotError::InvalidQuery("No text provided".to_string()));
        }

        Ok(Self {
            user_id: user_id.into().trim().to_string(),
            text,
        })
    }
}

/// An indexed documentation or ticket chunk returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub id: String,
    /// Relevance score from the index (higher is closer)
    pub score: f32,
    pub text: String,
    pub url: String,
    pub url_id: String,
    pub parent_id: String,
}

/// A stored (query, answer) pair for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub user_id: String,
    pub input_text: String,
    pub llm_response: String,
    /// RFC 3339, UTC
    pub created_at: String,
}

impl ConversationTurn {
    /// Create a turn with a fresh identifier stamped with the current time
    pub fn new(user_id: String, input_text: String, llm_response: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            input_text,
            llm_response,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Output of the answer generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer: String,
    pub cited_urls: Vec<String>,
}

/// Inbound `/chat` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
}

/// Outbound `/chat` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub user_id: String,
    #[serde(rename = "LLM_Response")]
    pub llm_response: String,
    #[serde(rename = "Cited_URLs")]
    pub cited_urls: Vec<String>,
}

impl ChatResponse {
    pub fn from_generation(user_id: String, result: GenerationResult) -> Self {
        Self {
            user_id,
            llm_response: result.answer,
            cited_urls: result.cited_urls,
        }
    }
}

/// A support ticket as stored in the ticket collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub priority: String,
    pub topics: String,
    pub keywords: String,
    pub sentiment: String,
    pub created_at: String,
}

/// Error taxonomy of the chat pipeline
#[derive(Debug, Clone, thiserror::Error)]
pub enum CopilotError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Failed to persist conversation turn: {0}")]
    PersistenceError(String),

    #[error("Answer generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CopilotError {
    /// Whether the caller caused this error and can fix it
    pub fn is_client_error(&self) -> bool {
        matches!(self, CopilotError::InvalidQuery(_))
    }
}
