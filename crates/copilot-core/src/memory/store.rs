//! ============================================================================
//! Conversation Memory - Per-user history of answered questions
//! ============================================================================
//! Every answered turn is embedded by its question and stored with the
//! user's id. Recall is a similarity query filtered to that exact user id.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MAX_RECALL_LIMIT;
use crate::retrieval::{Embedder, FieldMatch, IndexPoint, NearestQuery, Payload, VectorIndex};
use crate::types::{ConversationTurn, CopilotError};

/// Conversation memory backed by a vector collection
pub struct ConversationMemory {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    timeout: Duration,
}

impl ConversationMemory {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            timeout,
        }
    }

    /// Create the history collection if needed
    pub async fn ensure_collection(&self) -> anyhow::Result<()> {
        self.index
            .ensure_collection(&self.collection, self.embedder.dimension())
            .await
    }

    /// Store a new turn and return its id
    pub async fn persist(
        &self,
        user_id: &str,
        input_text: &str,
        llm_response: &str,
    ) -> Result<Uuid, CopilotError> {
        if input_text.trim().is_empty() {
            return Err(CopilotError::PersistenceError(
                "Turn input text is empty".to_string(),
            ));
        }

        debug!("Inserting chat history for user {:?}", user_id);

        let turn = ConversationTurn::new(
            user_id.to_string(),
            input_text.to_string(),
            llm_response.to_string(),
        );

        match tokio::time::timeout(self.timeout, self.write_turn(&turn)).await {
            Ok(Ok(())) => {
                info!("Stored turn {} for user {:?}", turn.id, user_id);
                Ok(turn.id)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CopilotError::PersistenceError(format!(
                "Write timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn write_turn(&self, turn: &ConversationTurn) -> Result<(), CopilotError> {
        let vector = self
            .embedder
            .embed(&turn.input_text)
            .await
            .map_err(|e| CopilotError::PersistenceError(e.to_string()))?;

        let point = IndexPoint {
            id: turn.id.to_string(),
            vector,
            payload: turn_payload(turn),
        };

        self.index
            .upsert(&self.collection, point)
            .await
            .map_err(|e| CopilotError::PersistenceError(e.to_string()))
    }

    /// Prior answers of `user_id` most similar to `query_text`.
    ///
    /// Never fails: lookup problems yield an empty sequence, which callers
    /// treat the same as "no history".
    pub async fn recall(&self, user_id: &str, query_text: &str, limit: usize) -> Vec<String> {
        let limit = limit.min(MAX_RECALL_LIMIT);
        if limit == 0 || query_text.trim().is_empty() {
            return Vec::new();
        }

        match tokio::time::timeout(self.timeout, self.try_recall(user_id, query_text, limit)).await {
            Ok(Ok(responses)) => {
                debug!(
                    "Recalled {} prior responses for user {:?}",
                    responses.len(),
                    user_id
                );
                responses
            }
            Ok(Err(e)) => {
                warn!("Could not load previous responses: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Previous response lookup timed out after {:?}", self.timeout);
                Vec::new()
            }
        }
    }

    async fn try_recall(
        &self,
        user_id: &str,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<String>, CopilotError> {
        let vector = self.embedder.embed(query_text).await?;

        let hits = self
            .index
            .query(
                &self.collection,
                NearestQuery::new(vector, limit as u64).filter(FieldMatch::new("user_id", user_id)),
            )
            .await
            .map_err(|e| CopilotError::IndexUnavailable(e.to_string()))?;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.payload.get("user_id").and_then(|v| v.as_str()) == Some(user_id))
            .filter_map(|hit| {
                hit.payload
                    .get("llm_response")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .take(limit)
            .collect())
    }
}

fn turn_payload(turn: &ConversationTurn) -> Payload {
    let mut payload = Payload::new();
    payload.insert("user_id".to_string(), json!(turn.user_id));
    payload.insert("input_text".to_string(), json!(turn.input_text));
    payload.insert("llm_response".to_string(), json!(turn.llm_response));
    payload.insert("created_at".to_string(), json!(turn.created_at));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::InMemoryIndex;
    use crate::testing::{FailingEmbedder, FailingIndex, HashEmbedder, StallingIndex, UnfilteredIndex};

    const HISTORY: &str = "history";

    fn memory_with(index: Arc<dyn VectorIndex>) -> ConversationMemory {
        ConversationMemory::new(
            Arc::new(HashEmbedder::new()),
            index,
            HISTORY,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_persist_then_recall_round_trip() {
        let index = Arc::new(InMemoryIndex::new());
        let memory = memory_with(index.clone());

        let id = memory
            .persist("u1", "How do I configure SSO?", "Open the SSO settings page.")
            .await
            .unwrap();

        let payloads = index.payloads(HISTORY);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["user_id"], "u1");
        assert_eq!(payloads[0]["input_text"], "How do I configure SSO?");
        assert!(payloads[0]["created_at"].as_str().is_some());
        assert!(!id.is_nil());

        let recalled = memory.recall("u1", "How do I configure SSO?", 5).await;
        assert_eq!(recalled, vec!["Open the SSO settings page.".to_string()]);
    }

    #[tokio::test]
    async fn test_recall_is_isolated_per_user() {
        let memory = memory_with(Arc::new(InMemoryIndex::new()));
        let text = "reset my password";

        memory.persist("alice", text, "alice answer").await.unwrap();
        memory.persist("bob", text, "bob answer").await.unwrap();
        memory.persist("", text, "anonymous answer").await.unwrap();

        assert_eq!(memory.recall("alice", text, 5).await, vec!["alice answer"]);
        assert_eq!(memory.recall("bob", text, 5).await, vec!["bob answer"]);
        assert_eq!(memory.recall("", text, 5).await, vec!["anonymous answer"]);
        assert!(memory.recall("mallory", text, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_recall_rechecks_user_when_store_ignores_filter() {
        let memory = memory_with(Arc::new(UnfilteredIndex::new()));
        let text = "reset my password";

        memory.persist("bob", text, "bob answer").await.unwrap();
        memory.persist("alice", text, "alice answer").await.unwrap();
        memory.persist("mallory", text, "mallory answer").await.unwrap();

        assert_eq!(memory.recall("alice", text, 5).await, vec!["alice answer"]);
        assert!(memory.recall("eve", text, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_recall_orders_by_similarity_and_limits() {
        let memory = memory_with(Arc::new(InMemoryIndex::new()));
        memory.persist("u1", "salesforce connector setup", "connector answer").await.unwrap();
        memory.persist("u1", "lineage graph missing tables", "lineage answer").await.unwrap();
        memory.persist("u1", "salesforce connector ingestion failing", "ingestion answer").await.unwrap();

        let recalled = memory.recall("u1", "salesforce connector setup", 2).await;
        assert_eq!(recalled.len(), 2);
        assert_eq!(recalled[0], "connector answer");
        assert!(!recalled.contains(&"lineage answer".to_string()));
    }

    #[tokio::test]
    async fn test_recall_skips_entries_without_response() {
        let index = Arc::new(InMemoryIndex::new());
        let embedder = HashEmbedder::new();
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), json!("u1"));
        index
            .upsert(
                HISTORY,
                IndexPoint {
                    id: "legacy".to_string(),
                    vector: embedder.vector_for("sso question"),
                    payload,
                },
            )
            .await
            .unwrap();

        let memory = memory_with(index);
        assert!(memory.recall("u1", "sso question", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_recall_degrades_to_empty() {
        assert!(memory_with(Arc::new(FailingIndex)).recall("u1", "sso", 5).await.is_empty());

        let memory = ConversationMemory::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryIndex::new()),
            HISTORY,
            Duration::from_secs(5),
        );
        assert!(memory.recall("u1", "sso", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_recall_timeout_degrades_to_empty() {
        let memory = ConversationMemory::new(
            Arc::new(HashEmbedder::new()),
            Arc::new(StallingIndex),
            HISTORY,
            Duration::from_millis(20),
        );
        assert!(memory.recall("u1", "sso", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_recall_zero_limit_or_blank_query_skips_upstream() {
        let embedder = Arc::new(HashEmbedder::new());
        let memory = ConversationMemory::new(
            embedder.clone(),
            Arc::new(InMemoryIndex::new()),
            HISTORY,
            Duration::from_secs(5),
        );
        assert!(memory.recall("u1", "sso", 0).await.is_empty());
        assert!(memory.recall("u1", "   ", 5).await.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_persist_timeout_is_persistence_error() {
        let memory = ConversationMemory::new(
            Arc::new(HashEmbedder::new()),
            Arc::new(StallingIndex),
            HISTORY,
            Duration::from_millis(20),
        );
        assert!(matches!(
            memory.persist("u1", "question", "answer").await,
            Err(CopilotError::PersistenceError(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_failures_are_persistence_errors() {
        let memory = memory_with(Arc::new(FailingIndex));
        assert!(matches!(
            memory.persist("u1", "question", "answer").await,
            Err(CopilotError::PersistenceError(_))
        ));
        assert!(matches!(
            memory.persist("u1", "  ", "answer").await,
            Err(CopilotError::PersistenceError(_))
        ));
    }
}
