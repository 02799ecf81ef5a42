//! Error types for parley-server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::provider::InferenceError;

/// Server errors surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ServerError {
    /// Message shown to the end user. Actionable, never raw internals.
    fn user_message(&self) -> String {
        match self {
            Self::SessionNotFound(_) => {
                "Conversation not found. Please start a new conversation.".into()
            }
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Inference(InferenceError::Unreachable { .. }) => {
                "AI service is unavailable. Please ensure Ollama is running.".into()
            }
            Self::Inference(InferenceError::Timeout { .. }) => {
                "The AI took too long to respond. Please try sending your message again.".into()
            }
            Self::Inference(InferenceError::BadResponse(_)) => {
                "Failed to process your message. Please try again.".into()
            }
        }
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Inference(InferenceError::Unreachable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE")
            }
            ServerError::Inference(InferenceError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "MODEL_TIMEOUT")
            }
            ServerError::Inference(InferenceError::BadResponse(_)) => {
                (StatusCode::BAD_GATEWAY, "MODEL_ERROR")
            }
        };

        tracing::warn!(error = %self, code, "Request failed");

        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.user_message(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
