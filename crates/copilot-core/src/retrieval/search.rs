//! ============================================================================
//! Similarity Search - Top-K content chunks for a query
//! ============================================================================
//! Any failure past input validation degrades to an empty result so that
//! answer generation can still run without grounding.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::embeddings::Embedder;
use super::index::{NearestQuery, Payload, ScoredPayload, VectorIndex};
use crate::types::{ContentChunk, CopilotError};

/// Nearest-neighbour search over the content collection
pub struct SimilaritySearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    vector_name: Option<String>,
    timeout: Duration,
}

impl SimilaritySearch {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        vector_name: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            vector_name,
            timeout,
        }
    }

    /// Up to `k` chunks, highest score first.
    ///
    /// Only a blank query or `k == 0` is an error; embedding, index and
    /// timeout failures yield an empty sequence.
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<ContentChunk>, CopilotError> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            return Err(CopilotError::InvalidQuery("Query text is required".to_string()));
        }
        if k == 0 {
            return Err(CopilotError::InvalidQuery("k must be positive".to_string()));
        }

        match tokio::time::timeout(self.timeout, self.try_search(query_text, k)).await {
            Ok(Ok(chunks)) => {
                debug!("Similarity search returned {} chunks", chunks.len());
                Ok(chunks)
            }
            Ok(Err(e)) => {
                warn!("Similarity search failed, continuing without context: {}", e);
                Ok(Vec::new())
            }
            Err(_) => {
                warn!(
                    "Similarity search timed out after {:?}, continuing without context",
                    self.timeout
                );
                Ok(Vec::new())
            }
        }
    }

    async fn try_search(&self, query_text: &str, k: usize) -> Result<Vec<ContentChunk>, CopilotError> {
        let vector = self.embedder.embed(query_text).await?;

        let hits = self
            .index
            .query(
                &self.collection,
                NearestQuery::new(vector, k as u64).using(self.vector_name.clone()),
            )
            .await
            .map_err(|e| CopilotError::IndexUnavailable(e.to_string()))?;

        let mut chunks: Vec<ContentChunk> = hits.into_iter().map(chunk_from_hit).collect();
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
        chunks.truncate(k);
        Ok(chunks)
    }
}

fn chunk_from_hit(hit: ScoredPayload) -> ContentChunk {
    let payload = &hit.payload;
    ContentChunk {
        id: hit.id,
        score: if hit.score.is_finite() { hit.score } else { 0.0 },
        text: payload_string(payload, "text"),
        url: payload_string(payload, "url"),
        url_id: payload_string(payload, "url_id"),
        parent_id: payload_string(payload, "parent_id"),
    }
}

/// String field, numbers rendered as text, anything else empty
pub(crate) fn payload_string(payload: &Payload, key: &str) -> String {
    match payload.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
