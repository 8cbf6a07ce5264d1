//! ============================================================================
//! Retrieval Module - Embeddings, vector index and similarity search
//! ============================================================================
//! ## Architecture
//! ```text
//! query text → Embedder → vector → VectorIndex::query → ContentChunk[]
//! ```
//! Production wiring uses [`EmbeddingService`] and [`QdrantIndex`];
//! [`InMemoryIndex`] stands in for Qdrant in tests and offline runs.
//! ============================================================================

pub mod embeddings;
pub mod index;
mod qdrant;
mod search;

pub use embeddings::{Embedder, EmbeddingService, DEFAULT_EMBEDDING_MODEL, EMBEDDING_DIM};
pub use index::{FieldMatch, InMemoryIndex, IndexPoint, NearestQuery, Payload, ScoredPayload, VectorIndex};
pub use qdrant::QdrantIndex;
pub use search::SimilaritySearch;

pub(crate) use search::payload_string;
