//! ============================================================================
//! Copilot Configuration
//! ============================================================================
//! Settings are read from environment variables (a `.env` file is loaded by
//! the server binary before this runs). Every knob has a default except the
//! model API key, which is only required to bring the pipeline online.
//! ============================================================================

use std::time::Duration;

use crate::types::CopilotError;

/// Cap on how many prior answers a single recall may return
pub const MAX_RECALL_LIMIT: usize = 20;

/// Default gRPC endpoint of a local Qdrant
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default OpenAI-compatible API root
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Which cited URLs survive generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationPolicy {
    /// Keep whatever the model reported
    #[default]
    Permissive,
    /// Keep only URLs that belong to retrieved chunks
    RetrievedOnly,
}

impl std::str::FromStr for CitationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(CitationPolicy::Permissive),
            "retrieved" | "retrieved_only" | "strict" => Ok(CitationPolicy::RetrievedOnly),
            _ => Err(format!("Unknown citation policy: {}", s)),
        }
    }
}

/// Full configuration of the chat pipeline
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    /// Collection holding documentation / ticket chunks
    pub content_collection: String,
    /// Collection holding raw support tickets (listing only)
    pub ticket_collection: String,
    /// Collection holding conversation turns
    pub history_collection: String,
    /// Named vector in the content collection, if any
    pub content_vector_name: Option<String>,
    pub search_top_k: usize,
    pub recall_limit: usize,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chat_model: String,

    pub max_context_chars: usize,
    pub upstream_timeout: Duration,
    pub citation_policy: CitationPolicy,
    /// Cited in the canned reply when the pipeline is offline
    pub fallback_url: Option<String>,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            content_collection: "support_docs".to_string(),
            ticket_collection: "support_tickets".to_string(),
            history_collection: "chat_history".to_string(),
            content_vector_name: None,
            search_top_k: 5,
            recall_limit: 5,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            chat_model: "gpt-4o-mini".to_string(),
            max_context_chars: 12_000,
            upstream_timeout: Duration::from_secs(30),
            citation_policy: CitationPolicy::Permissive,
            fallback_url: None,
        }
    }
}

impl CopilotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, CopilotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CopilotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            qdrant_url: get("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            qdrant_api_key: get("QDRANT_API_KEY"),
            content_collection: get("QDRANT_COLLECTION").unwrap_or(defaults.content_collection),
            ticket_collection: get("QDRANT_TICKET_COLLECTION")
                .unwrap_or(defaults.ticket_collection),
            history_collection: get("QDRANT_HISTORY_COLLECTION")
                .unwrap_or(defaults.history_collection),
            content_vector_name: get("QDRANT_VECTOR_NAME"),
            search_top_k: parse_number(&get, "QDRANT_TOP_K", defaults.search_top_k)?,
            recall_limit: parse_number(&get, "MEMORY_RECALL_LIMIT", defaults.recall_limit)?
                .min(MAX_RECALL_LIMIT),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            embedding_model: get("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dim: parse_number(&get, "EMBEDDING_DIM", defaults.embedding_dim)?,
            chat_model: get("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            max_context_chars: parse_number(
                &get,
                "COPILOT_MAX_CONTEXT_CHARS",
                defaults.max_context_chars,
            )?,
            upstream_timeout: Duration::from_secs(parse_number(
                &get,
                "COPILOT_UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            citation_policy: match get("COPILOT_CITATION_POLICY") {
                Some(raw) => raw.parse().map_err(CopilotError::Config)?,
                None => defaults.citation_policy,
            },
            fallback_url: get("COPILOT_FALLBACK_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CopilotError> {
        if self.search_top_k == 0 {
            return Err(CopilotError::Config("QDRANT_TOP_K must be positive".to_string()));
        }
        if self.embedding_dim == 0 {
            return Err(CopilotError::Config("EMBEDDING_DIM must be positive".to_string()));
        }
        if self.upstream_timeout.is_zero() {
            return Err(CopilotError::Config(
                "COPILOT_UPSTREAM_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// API key for the model provider, required for online mode
    pub fn require_api_key(&self) -> Result<&str, CopilotError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| CopilotError::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T, CopilotError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CopilotError::Config(format!("{} is not a valid number: {}", key, raw))),
        None => Ok(default),
    }
}
