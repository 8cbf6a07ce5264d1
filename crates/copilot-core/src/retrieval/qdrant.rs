//! ============================================================================
//! Qdrant Index - Vector database operations
//! ============================================================================
//! [`VectorIndex`] over a Qdrant instance (gRPC). Payloads are converted
//! between JSON scalars and Qdrant values; nested values are not stored.
//! ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder, Distance, Filter, PointId,
    PointStruct, Query, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};

use super::index::{IndexPoint, NearestQuery, Payload, ScoredPayload, VectorIndex};

/// Vector index backed by Qdrant
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    /// Connect to Qdrant. The connection itself is lazy; use
    /// [`QdrantIndex::health_check`] to verify reachability.
    pub fn connect(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create Qdrant client: {}", e))?;

        Ok(Self { client })
    }

    /// Check if the store is healthy/connected
    pub async fn health_check(&self) -> bool {
        match self.client.health_check().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Qdrant health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, collection: &str, point: IndexPoint) -> Result<()> {
        if point.vector.is_empty() {
            return Err(anyhow!("Cannot store point without vector"));
        }

        debug!("Upserting point {} into {}", point.id, collection);

        let point = PointStruct::new(point.id, point.vector, to_qdrant_payload(point.payload));

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| anyhow!("Failed to upsert point: {}", e))?;

        Ok(())
    }

    async fn query(&self, collection: &str, query: NearestQuery) -> Result<Vec<ScoredPayload>> {
        debug!(
            "Querying {} (limit: {}, filtered: {})",
            collection,
            query.limit,
            query.filter.is_some()
        );

        let mut builder = QueryPointsBuilder::new(collection)
            .query(Query::new_nearest(query.vector))
            .limit(query.limit)
            .with_payload(true);

        if let Some(field) = query.filter {
            builder = builder.filter(Filter::must([Condition::matches(field.key, field.value)]));
        }
        if let Some(name) = query.using {
            builder = builder.using(name);
        }

        let response = self
            .client
            .query(builder)
            .await
            .map_err(|e| anyhow!("Failed to query points: {}", e))?;

        let hits: Vec<ScoredPayload> = response
            .result
            .into_iter()
            .map(|point| ScoredPayload {
                id: point.id.map(point_id_to_string).unwrap_or_default(),
                score: point.score,
                payload: from_qdrant_payload(point.payload),
            })
            .collect();

        debug!("Found {} hits in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn scroll(&self, collection: &str, limit: u32) -> Result<Vec<Payload>> {
        let scroll_result = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .limit(limit)
                    .with_payload(true),
            )
            .await
            .map_err(|e| anyhow!("Failed to scroll points: {}", e))?;

        Ok(scroll_result
            .result
            .into_iter()
            .map(|point| from_qdrant_payload(point.payload))
            .collect())
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| anyhow!("Failed to check collection existence: {}", e))?;

        if exists {
            debug!("Collection {} already exists", collection);
            return Ok(());
        }

        info!("Creating collection: {}", collection);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| anyhow!("Failed to create collection: {}", e))?;

        info!("Collection {} created successfully", collection);
        Ok(())
    }
}

fn point_id_to_string(point_id: PointId) -> String {
    match point_id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

fn to_qdrant_payload(payload: Payload) -> HashMap<String, Value> {
    payload
        .into_iter()
        .filter_map(|(key, value)| {
            let converted = match value {
                serde_json::Value::String(s) => Value::from(s),
                serde_json::Value::Bool(b) => Value::from(b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => Value::from(i),
                    None => Value::from(n.as_f64()?),
                },
                _ => {
                    debug!("Skipping non-scalar payload field {}", key);
                    return None;
                }
            };
            Some((key, converted))
        })
        .collect()
}

fn from_qdrant_payload(payload: HashMap<String, Value>) -> Payload {
    payload
        .into_iter()
        .filter_map(|(key, value)| {
            let converted = if let Some(s) = value.as_str() {
                serde_json::Value::from(s.as_str())
            } else if let Some(i) = value.as_integer() {
                serde_json::Value::from(i)
            } else if let Some(f) = value.as_double() {
                serde_json::Value::from(f)
            } else if let Some(b) = value.as_bool() {
                serde_json::Value::from(b)
            } else {
                return None;
            };
            Some((key, converted))
        })
        .collect()
}
