//! Client for the inference backend.
//!
//! The server talks to a locally hosted Ollama instance. The request/response
//! shapes and the error taxonomy here are the whole contract: an ordered
//! sequence of role/content pairs goes in, generated text comes out, and any
//! failure is one of three kinds. No failure is retried automatically.

mod ollama;

pub use ollama::{OllamaClient, FALLBACK_GREETING};

use serde::{Deserialize, Serialize};

use crate::session::Role;

/// One role/content pair sent to the backend. The context projection of a
/// [`crate::session::Turn`], without the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Failure kinds for an inference call.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The backend could not be contacted at all.
    #[error("cannot reach inference backend at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The backend answered, but with a non-success status or a body
    /// that could not be decoded.
    #[error("inference backend returned a bad response: {0}")]
    BadResponse(String),

    /// The call exceeded its time bound.
    #[error("inference call exceeded {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Result of probing the backend, for startup diagnostics.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub model_available: bool,
    pub available_models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_role_lowercase() {
        let msg = ChatMessage {
            role: Role::User,
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello"}"#);
    }

    #[test]
    fn inference_error_display() {
        let err = InferenceError::Timeout { timeout_secs: 60 };
        assert_eq!(err.to_string(), "inference call exceeded 60s");
    }
}
