//! ============================================================================
//! Chat Pipeline - Retrieval-augmented response for one chat turn
//! ============================================================================
//! query → (similarity search ‖ memory recall) → context → generation
//!       → response, with the new turn persisted on a background task.
//!
//! Search and recall degrade to empty on failure; only generation failure
//! is returned to the caller.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{CitationPolicy, CopilotConfig};
use crate::generation::{AnswerGenerator, ChatCompletionClient, CompletionModel, ContextAssembler};
use crate::memory::{ConversationMemory, TurnPersister};
use crate::retrieval::{Embedder, EmbeddingService, SimilaritySearch, VectorIndex};
use crate::types::{ChatRequest, ChatResponse, CopilotError, Query};

/// Knobs of the pipeline, independent of the concrete clients
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub content_collection: String,
    pub history_collection: String,
    pub content_vector_name: Option<String>,
    pub search_top_k: usize,
    pub recall_limit: usize,
    pub max_context_chars: usize,
    pub citation_policy: CitationPolicy,
    pub upstream_timeout: Duration,
}

impl From<&CopilotConfig> for PipelineSettings {
    fn from(config: &CopilotConfig) -> Self {
        Self {
            content_collection: config.content_collection.clone(),
            history_collection: config.history_collection.clone(),
            content_vector_name: config.content_vector_name.clone(),
            search_top_k: config.search_top_k,
            recall_limit: config.recall_limit,
            max_context_chars: config.max_context_chars,
            citation_policy: config.citation_policy,
            upstream_timeout: config.upstream_timeout,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&CopilotConfig::default())
    }
}

/// Result of a chat turn plus the handle of its background persistence
pub struct ChatOutcome {
    pub response: ChatResponse,
    /// Resolves to the stored turn id, or `None` if persisting failed
    pub persistence: JoinHandle<Option<Uuid>>,
}

/// The retrieval-augmented chat pipeline.
///
/// Built once at startup from shared clients and reused for every request.
pub struct ChatPipeline {
    search: SimilaritySearch,
    memory: Arc<ConversationMemory>,
    persister: TurnPersister,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
    search_top_k: usize,
    recall_limit: usize,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        completion: Arc<dyn CompletionModel>,
        settings: PipelineSettings,
    ) -> Self {
        let search = SimilaritySearch::new(
            embedder.clone(),
            index.clone(),
            settings.content_collection,
            settings.content_vector_name,
            settings.upstream_timeout,
        );
        let memory = Arc::new(ConversationMemory::new(
            embedder,
            index,
            settings.history_collection,
            settings.upstream_timeout,
        ));

        Self {
            search,
            persister: TurnPersister::new(memory.clone()),
            memory,
            assembler: ContextAssembler::new(settings.max_context_chars),
            generator: AnswerGenerator::new(
                completion,
                settings.citation_policy,
                settings.upstream_timeout,
            ),
            search_top_k: settings.search_top_k,
            recall_limit: settings.recall_limit,
        }
    }

    /// Wire the OpenAI-compatible model clients from config around `index`.
    ///
    /// Only configuration problems fail here. A history collection that
    /// cannot be created is logged and left to the per-request degrade path.
    pub async fn from_config(
        config: &CopilotConfig,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, CopilotError> {
        let embedder = EmbeddingService::from_config(config)?;
        let completion = ChatCompletionClient::from_config(config)?;
        info!(
            "Using chat model {} and embedding model {} at {}",
            completion.model(),
            embedder.model(),
            embedder.base_url()
        );

        let pipeline = Self::new(
            Arc::new(embedder),
            index,
            Arc::new(completion),
            PipelineSettings::from(config),
        );

        if let Err(e) = pipeline.memory.ensure_collection().await {
            warn!("Could not ensure history collection exists: {}", e);
        }

        info!(
            "Chat pipeline ready (top_k: {}, recall_limit: {}, max_context_chars: {})",
            pipeline.search_top_k,
            pipeline.recall_limit,
            pipeline.assembler.max_chars()
        );
        Ok(pipeline)
    }

    /// Answer a validated query
    pub async fn respond(&self, query: &Query) -> Result<ChatOutcome, CopilotError> {
        info!("Chat turn for user {:?}", query.user_id);
        debug!("Query text: {}", query.text);

        let (chunks, prior_answers) = tokio::join!(
            self.search.search(&query.text, self.search_top_k),
            self.memory
                .recall(&query.user_id, &query.text, self.recall_limit),
        );
        let chunks = chunks?;

        debug!(
            "Retrieved {} chunks and {} prior answers",
            chunks.len(),
            prior_answers.len()
        );

        let context = self.assembler.assemble(&chunks, &prior_answers);
        let result = self.generator.generate(&query.text, &context).await?;

        let persistence = self.persister.spawn(
            query.user_id.clone(),
            query.text.clone(),
            result.answer.clone(),
        );

        Ok(ChatOutcome {
            response: ChatResponse::from_generation(query.user_id.clone(), result),
            persistence,
        })
    }

    /// Validate a raw request and answer it, leaving persistence detached
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, CopilotError> {
        let query = Query::new(request.user_id, request.text)?;
        Ok(self.respond(&query).await?.response)
    }
}

/// Canned reply used when the pipeline could not be built at startup
pub fn fallback_response(query: &Query, fallback_url: Option<&str>) -> ChatResponse {
    ChatResponse {
        user_id: query.user_id.clone(),
        llm_response: format!(
            "I received your message: '{}'. The answer service is not fully configured right now, \
             so this is an automatic reply. Please try again later.",
            query.text
        ),
        cited_urls: fallback_url.map(|u| vec![u.to_string()]).unwrap_or_default(),
    }
}
