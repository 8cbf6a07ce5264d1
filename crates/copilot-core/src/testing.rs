//! Deterministic fakes for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::generation::completion::{CompletionModel, CompletionPrompt};
use crate::retrieval::embeddings::Embedder;
use crate::retrieval::index::{
    InMemoryIndex, IndexPoint, NearestQuery, Payload, ScoredPayload, VectorIndex,
};
use crate::types::CopilotError;

pub const TEST_DIM: usize = 64;

/// Bag-of-words embedder: each lowercase token bumps one hashed bucket.
/// Identical texts map to identical vectors.
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; TEST_DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % TEST_DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CopilotError> {
        if text.trim().is_empty() {
            return Err(CopilotError::InvalidQuery("Cannot embed empty text".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        TEST_DIM
    }
}

/// Embedder whose upstream is always down
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CopilotError> {
        Err(CopilotError::EmbeddingUnavailable("connection refused".to_string()))
    }

    fn dimension(&self) -> usize {
        TEST_DIM
    }
}

/// Index that is unreachable
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _collection: &str, _point: IndexPoint) -> Result<()> {
        Err(anyhow!("index unreachable"))
    }

    async fn query(&self, _collection: &str, _query: NearestQuery) -> Result<Vec<ScoredPayload>> {
        Err(anyhow!("index unreachable"))
    }

    async fn scroll(&self, _collection: &str, _limit: u32) -> Result<Vec<Payload>> {
        Err(anyhow!("index unreachable"))
    }

    async fn ensure_collection(&self, _collection: &str, _dimension: usize) -> Result<()> {
        Err(anyhow!("index unreachable"))
    }
}

/// Index that never answers within any reasonable timeout
pub struct StallingIndex;

#[async_trait]
impl VectorIndex for StallingIndex {
    async fn upsert(&self, _collection: &str, _point: IndexPoint) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn query(&self, _collection: &str, _query: NearestQuery) -> Result<Vec<ScoredPayload>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn scroll(&self, _collection: &str, _limit: u32) -> Result<Vec<Payload>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn ensure_collection(&self, _collection: &str, _dimension: usize) -> Result<()> {
        Ok(())
    }
}

/// Completion model with a fixed reply that records every prompt
pub struct ScriptedCompletion {
    reply: Result<String, String>,
    prompts: Mutex<Vec<CompletionPrompt>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<CompletionPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletion {
    async fn complete(&self, prompt: &CompletionPrompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

/// Completion model that never answers within any reasonable timeout
pub struct StallingCompletion;

#[async_trait]
impl CompletionModel for StallingCompletion {
    async fn complete(&self, _prompt: &CompletionPrompt) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// In-memory index that ignores query filters, like a store that drops them
pub struct UnfilteredIndex {
    inner: InMemoryIndex,
}

impl UnfilteredIndex {
    pub fn new() -> Self {
        Self {
            inner: InMemoryIndex::new(),
        }
    }
}

#[async_trait]
impl VectorIndex for UnfilteredIndex {
    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<()> {
        self.inner.upsert(collection, point).await
    }

    async fn query(&self, collection: &str, mut query: NearestQuery) -> Result<Vec<ScoredPayload>> {
        query.filter = None;
        self.inner.query(collection, query).await
    }

    async fn scroll(&self, collection: &str, limit: u32) -> Result<Vec<Payload>> {
        self.inner.scroll(collection, limit).await
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.inner.ensure_collection(collection, dimension).await
    }
}
