//! ============================================================================
//! Generation Module - Context assembly and grounded answer generation
//! ============================================================================
//! ```text
//! chunks + prior answers → ContextAssembler → Context
//!                                               ↓
//!          user text + Context → AnswerGenerator → CompletionModel
//!                                               ↓
//!                                   GenerationResult (answer, cited URLs)
//! ```
//! ============================================================================

pub mod completion;
mod context;
mod generator;

pub use completion::{ChatCompletionClient, CompletionModel, CompletionPrompt};
pub use context::{Context, ContextAssembler};
pub use generator::AnswerGenerator;
