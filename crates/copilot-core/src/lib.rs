//! ============================================================================
//! COPILOT-CORE: Retrieval-augmented support chat
//! ============================================================================
//! This crate handles all backend logic for the support copilot:
//! - Query embedding via an OpenAI-compatible embeddings API
//! - Similarity search over documentation / ticket chunks in Qdrant
//! - Per-user conversation memory (recall + background persistence)
//! - Bounded context assembly and grounded answer generation with citations
//! ============================================================================

pub mod config;
pub mod generation;
pub mod memory;
pub mod pipeline;
pub mod retrieval;
pub mod tickets;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{CitationPolicy, CopilotConfig};
pub use pipeline::{fallback_response, ChatOutcome, ChatPipeline, PipelineSettings};
pub use tickets::TicketCatalog;
pub use types::*;
