//! ============================================================================
//! Memory Module - Per-user conversation memory
//! ============================================================================
//! Answered turns are stored in a vector collection keyed by the question's
//! embedding and recalled by similarity, strictly filtered to one user.
//!
//! ## Architecture
//! ```text
//! answered turn → TurnPersister (spawned) → ConversationMemory::persist → index
//! new question  → ConversationMemory::recall(user_id) → prior answers
//! ```
//! ============================================================================

mod persister;
mod store;

pub use persister::TurnPersister;
pub use store::ConversationMemory;
