//! Turn Persister - stores answered turns off the response path.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use super::store::ConversationMemory;

/// Fire-and-forget writer of answered turns
#[derive(Clone)]
pub struct TurnPersister {
    memory: Arc<ConversationMemory>,
}

impl TurnPersister {
    pub fn new(memory: Arc<ConversationMemory>) -> Self {
        Self { memory }
    }

    /// Persist a turn on a background task.
    ///
    /// Failures are logged and resolve to `None`; dropping the handle
    /// detaches the task without cancelling it.
    pub fn spawn(&self, user_id: String, input_text: String, llm_response: String) -> JoinHandle<Option<Uuid>> {
        let memory = self.memory.clone();
        tokio::spawn(async move {
            match memory.persist(&user_id, &input_text, &llm_response).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Failed to persist chat turn for user {:?}: {}", user_id, e);
                    None
                }
            }
        })
    }
}
