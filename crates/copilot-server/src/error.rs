//! HTTP error responses.
//!
//! Bodies are always `{"error": "<message>"}`. Server errors carry a fixed
//! message; the underlying cause is only logged.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use copilot_core::CopilotError;
use serde::Serialize;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Error type that converts into an Axum HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<CopilotError> for ApiError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::InvalidQuery(message) => ApiError::bad_request(message),
            other => {
                error!("Chat request failed: {}", other);
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// Turn a handler panic into the generic server error, logging the message
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("Request handler panicked: {}", detail);
    ApiError::internal().into_response()
}
