//! Ticket catalog - lists raw support tickets from the ticket collection.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::retrieval::{payload_string, Payload, VectorIndex};
use crate::types::Ticket;

/// Default number of tickets listed
pub const DEFAULT_TICKET_LIMIT: u32 = 30;

/// Upper bound on a single listing
pub const MAX_TICKET_LIMIT: u32 = 256;

pub struct TicketCatalog {
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl TicketCatalog {
    pub fn new(index: Arc<dyn VectorIndex>, collection: impl Into<String>) -> Self {
        Self {
            index,
            collection: collection.into(),
        }
    }

    /// First `limit` tickets in storage order (clamped to [`MAX_TICKET_LIMIT`])
    pub async fn list(&self, limit: u32) -> Result<Vec<Ticket>> {
        let limit = limit.min(MAX_TICKET_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let payloads = self.index.scroll(&self.collection, limit).await?;
        debug!("Fetched {} tickets from {}", payloads.len(), self.collection);

        Ok(payloads.iter().map(ticket_from_payload).collect())
    }
}

fn ticket_from_payload(payload: &Payload) -> Ticket {
    Ticket {
        id: payload_string(payload, "id"),
        subject: payload_string(payload, "subject"),
        body: payload_string(payload, "body"),
        priority: payload_string(payload, "priority"),
        topics: payload_string(payload, "topics"),
        keywords: payload_string(payload, "keywords"),
        sentiment: payload_string(payload, "sentiment"),
        created_at: payload_string(payload, "created_at"),
    }
}
