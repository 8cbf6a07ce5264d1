//! HTTP routes of the copilot server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a question with cited sources |
//! | `GET`/`POST` | `/fetch` | List support tickets (`?limit=N`) |
//! | `GET`  | `/health` | Liveness check |

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query as QueryParams, State},
    routing::{get, post},
    Json, Router,
};
use copilot_core::{
    fallback_response, tickets::DEFAULT_TICKET_LIMIT, ChatPipeline, ChatRequest, ChatResponse,
    Query, Ticket, TicketCatalog,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
};
use tracing::{debug, warn};

use crate::error::{panic_response, ApiError};

/// What answers requests: the full pipeline, or canned replies when it
/// could not be built at startup
#[derive(Clone)]
pub enum Backend {
    Online {
        pipeline: Arc<ChatPipeline>,
        tickets: Arc<TicketCatalog>,
    },
    Degraded {
        fallback_url: Option<String>,
    },
}

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/fetch", get(handle_fetch).post(handle_fetch))
        .route("/health", get(handle_health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        debug!("Rejected chat body: {}", e);
        ApiError::bad_request("No text provided")
    })?;

    let query = Query::new(request.user_id, request.text)?;

    match &state.backend {
        Backend::Online { pipeline, .. } => {
            // Persistence keeps running after the handle is dropped
            let outcome = pipeline.respond(&query).await?;
            Ok(Json(outcome.response))
        }
        Backend::Degraded { fallback_url } => {
            warn!("Answering with fallback reply, pipeline is offline");
            Ok(Json(fallback_response(&query, fallback_url.as_deref())))
        }
    }
}

// ============ GET|POST /fetch ============

#[derive(Debug, Deserialize)]
struct FetchParams {
    limit: Option<u32>,
}

async fn handle_fetch(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<FetchParams>,
) -> Json<Vec<Ticket>> {
    let limit = params.limit.unwrap_or(DEFAULT_TICKET_LIMIT);

    let tickets = match &state.backend {
        Backend::Online { tickets, .. } => tickets.list(limit).await.unwrap_or_else(|e| {
            warn!("Error fetching tickets: {}", e);
            Vec::new()
        }),
        Backend::Degraded { .. } => Vec::new(),
    };

    Json(tickets)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Server is running",
    })
}
