//! HTTP API routes.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::provider::OllamaClient;
use crate::session::{Role, SessionStore, StoreStats, Turn};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub ollama: OllamaClient,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        // Chat
        .route("/api/chat", post(send_message))
        .route("/api/chat/start", post(start_conversation))
        .route("/api/chat/history/:id", get(get_history))
        .route("/api/chat/:id", delete(clear_conversation))
        // Reporting
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

// ============ Health Check ============

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "parley-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "ollama": state.ollama.base_url(),
        "model": state.ollama.model(),
    }))
}

// ============ Chat ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub response: String,
    pub conversation_id: String,
    pub message_count: usize,
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ServerError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServerError::InvalidRequest(
            "Message is required and must be a non-empty string".into(),
        ));
    }

    // A supplied id must name a live session: appending to a stale or
    // invalid id fails with SESSION_NOT_FOUND rather than silently
    // starting a fresh conversation.
    let session_id = match request.conversation_id {
        Some(id) => id,
        None => state.store.create().await,
    };

    state.store.append(&session_id, Role::User, message).await?;

    let context = state.store.context(&session_id).await?;
    let reply = state.ollama.chat(&context).await?;

    // Only a successful inference call produces an assistant turn; the
    // user turn stays recorded either way.
    let turn = state
        .store
        .append(&session_id, Role::Assistant, reply)
        .await?;
    let message_count = state.store.message_count(&session_id).await;

    tracing::debug!(
        session_id = %session_id,
        message_count,
        "Chat turn completed"
    );

    Ok(Json(SendMessageResponse {
        response: turn.content,
        conversation_id: session_id,
        message_count,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationResponse {
    pub conversation_id: String,
    pub greeting: String,
}

async fn start_conversation(
    State(state): State<AppState>,
) -> Result<Json<StartConversationResponse>, ServerError> {
    let session_id = state.store.create().await;
    let greeting = state.ollama.greeting().await;
    state
        .store
        .append(&session_id, Role::Assistant, &greeting)
        .await?;

    tracing::info!(session_id = %session_id, "Started conversation");

    Ok(Json(StartConversationResponse {
        conversation_id: session_id,
        greeting,
    }))
}

// ============ History ============

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Turn>,
    pub message_count: usize,
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let messages = state
        .store
        .messages(&id)
        .await
        .ok_or_else(|| ServerError::SessionNotFound(id.clone()))?;

    Ok(Json(HistoryResponse {
        conversation_id: id,
        message_count: messages.len(),
        messages,
    }))
}

// ============ Clear ============

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearConversationResponse {
    pub message: String,
    pub conversation_id: String,
}

async fn clear_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ClearConversationResponse> {
    // Idempotent: clearing an absent conversation still reports success.
    let deleted = state.store.delete(&id).await;
    tracing::debug!(session_id = %id, deleted, "Cleared conversation");

    Json(ClearConversationResponse {
        message: "Conversation cleared successfully".into(),
        conversation_id: id,
    })
}

// ============ Stats ============

async fn get_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats().await)
}
