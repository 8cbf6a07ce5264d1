//! ============================================================================
//! Vector Index - Capability interface over the vector database
//! ============================================================================
//! The pipeline only needs three things from a vector store: upsert a point,
//! run a filtered nearest-neighbour query, and scroll payloads. Qdrant backs
//! this in production; [`InMemoryIndex`] backs tests and offline runs.
//! ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Point payload, JSON-shaped
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// A point to write into a collection
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPayload {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// Exact keyword match on a payload field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub key: String,
    pub value: String,
}

impl FieldMatch {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn accepts(&self, payload: &Payload) -> bool {
        payload.get(&self.key).and_then(|v| v.as_str()) == Some(self.value.as_str())
    }
}

/// Nearest-neighbour query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub vector: Vec<f32>,
    pub limit: u64,
    pub filter: Option<FieldMatch>,
    /// Named vector to search, `None` for the default vector
    pub using: Option<String>,
}

impl NearestQuery {
    pub fn new(vector: Vec<f32>, limit: u64) -> Self {
        Self {
            vector,
            limit,
            filter: None,
            using: None,
        }
    }

    pub fn filter(mut self, filter: FieldMatch) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn using(mut self, name: Option<String>) -> Self {
        self.using = name;
        self
    }
}

/// Vector store capability
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a point, returning once the write is applied
    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<()>;

    /// Ranked nearest neighbours, highest score first, payload attached
    async fn query(&self, collection: &str, query: NearestQuery) -> Result<Vec<ScoredPayload>>;

    /// Unfiltered payload listing
    async fn scroll(&self, collection: &str, limit: u32) -> Result<Vec<Payload>>;

    /// Create the collection (unnamed cosine vector) if it does not exist
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;
}

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: Payload,
}

/// In-memory vector index with brute-force cosine similarity.
///
/// Named vectors are ignored: every point carries exactly one vector.
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Whether a collection is empty or missing
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Payloads of a collection in insertion order
    pub fn payloads(&self, collection: &str) -> Vec<Payload> {
        self.collections
            .read()
            .map(|c| {
                c.get(collection)
                    .map(|points| points.iter().map(|p| p.payload.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("In-memory index lock poisoned"))?;
        let points = collections.entry(collection.to_string()).or_default();

        let stored = StoredPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        };
        match points.iter_mut().find(|p| p.id == stored.id) {
            Some(existing) => *existing = stored,
            None => points.push(stored),
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: NearestQuery) -> Result<Vec<ScoredPayload>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("In-memory index lock poisoned"))?;
        let Some(points) = collections.get(collection) else {
            return Err(anyhow!("Collection not found: {}", collection));
        };

        let mut hits: Vec<ScoredPayload> = points
            .iter()
            .filter(|p| query.filter.as_ref().map_or(true, |f| f.accepts(&p.payload)))
            .map(|p| ScoredPayload {
                id: p.id.clone(),
                score: cosine_sim(&query.vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.limit as usize);
        Ok(hits)
    }

    async fn scroll(&self, collection: &str, limit: u32) -> Result<Vec<Payload>> {
        let mut payloads = self.payloads(collection);
        payloads.truncate(limit as usize);
        Ok(payloads)
    }

    async fn ensure_collection(&self, collection: &str, _dimension: usize) -> Result<()> {
        self.collections
            .write()
            .map_err(|_| anyhow!("In-memory index lock poisoned"))?
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
