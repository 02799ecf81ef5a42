//! Conversation session management.
//!
//! The [`SessionStore`] is the authoritative in-process registry of live
//! conversations. It owns session creation, appends, retention truncation,
//! and expiry. Each operation takes the registry lock exactly once and runs
//! to completion, so turns within a session are never interleaved.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ServerError;

/// Speaker role for a conversation turn. Any other value is rejected
/// at the serde boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message exchanged in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One conversation: identity plus retained turn history.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Append a turn, truncating from the front when the retained
    /// history exceeds `max_messages`.
    fn push(&mut self, role: Role, content: String, max_messages: usize) -> Turn {
        let turn = Turn {
            role,
            content,
            timestamp: Utc::now(),
        };
        self.messages.push(turn.clone());
        self.last_activity = Utc::now();

        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }

        turn
    }

    /// Check if the session has been idle longer than `max_age`.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        Utc::now() - self.last_activity > max_age
    }
}

/// Per-session metadata, for reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            message_count: session.messages.len(),
            created_at: session.created_at,
            last_activity: session.last_activity,
        }
    }
}

/// Store-wide statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_sessions: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Generate an opaque session token: 128 bits of randomness, hex-encoded.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// In-memory registry of live conversation sessions.
///
/// Cheap to clone; all clones share the same registry. Constructed at
/// process start and injected wherever it is needed, so tests get
/// isolated instances.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    max_messages: usize,
}

impl SessionStore {
    /// Create an empty store retaining at most `max_messages` turns
    /// per session.
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_messages,
        }
    }

    /// Create a new empty session and return its id.
    pub async fn create(&self) -> String {
        let id = generate_session_id();
        let session = Session::new(id.clone());
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// Append a turn to a session.
    ///
    /// Fails with `SessionNotFound` for unknown ids; it never silently
    /// creates a session.
    pub async fn append(
        &self,
        id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> Result<Turn, ServerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;
        Ok(session.push(role, content.into(), self.max_messages))
    }

    /// Get the retained turn history for a session, or `None` for an
    /// unknown id.
    pub async fn messages(&self, id: &str) -> Option<Vec<Turn>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|s| s.messages.clone())
    }

    /// Number of retained turns; 0 for an unknown id.
    pub async fn message_count(&self, id: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(id).map_or(0, |s| s.messages.len())
    }

    /// Per-session metadata, or `None` for an unknown id.
    pub async fn info(&self, id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(SessionInfo::from)
    }

    /// Remove a session. Idempotent; returns whether a removal occurred.
    pub async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Remove every session idle longer than `max_age`; returns the
    /// number removed.
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(max_age));
        before - sessions.len()
    }

    /// Store-wide statistics.
    pub async fn stats(&self) -> StoreStats {
        let sessions = self.sessions.read().await;
        StoreStats {
            total_sessions: sessions.len(),
            sessions: sessions.values().map(SessionInfo::from).collect(),
        }
    }

    /// Read a session by id.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_distinct_ids() {
        let store = SessionStore::new(20);
        let mut ids = std::collections::HashSet::new();
        for _ in 0..500 {
            assert!(ids.insert(store.create().await));
        }
    }

    #[tokio::test]
    async fn session_ids_are_fixed_length_hex() {
        let store = SessionStore::new(20);
        let id = store.create().await;
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn append_preserves_chronological_order() {
        let store = SessionStore::new(20);
        let id = store.create().await;

        store.append(&id, Role::User, "Hello").await.unwrap();
        store.append(&id, Role::Assistant, "Hi there!").await.unwrap();

        let messages = store.messages(&id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hi there!");
        assert_eq!(store.message_count(&id).await, 2);
    }

    #[tokio::test]
    async fn append_truncates_to_most_recent() {
        let store = SessionStore::new(20);
        let id = store.create().await;

        for i in 0..25 {
            store
                .append(&id, Role::User, format!("message {}", i))
                .await
                .unwrap();
        }

        assert_eq!(store.message_count(&id).await, 20);
        let messages = store.messages(&id).await.unwrap();
        // The oldest five are gone; the first retained is the 6th appended.
        assert_eq!(messages[0].content, "message 5");
        assert_eq!(messages[19].content, "message 24");
    }

    #[tokio::test]
    async fn append_unknown_id_fails() {
        let store = SessionStore::new(20);
        let err = store.append("no-such-id", Role::User, "x").await.unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound(_)));
        // The failed append must not have created anything.
        assert_eq!(store.stats().await.total_sessions, 0);
    }

    #[tokio::test]
    async fn reads_on_unknown_id_default_instead_of_failing() {
        let store = SessionStore::new(20);
        assert!(store.messages("missing").await.is_none());
        assert_eq!(store.message_count("missing").await, 0);
        assert!(store.info("missing").await.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SessionStore::new(20);
        let id = store.create().await;
        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);

        let err = store.append(&id, Role::User, "x").await.unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn last_activity_is_non_decreasing() {
        let store = SessionStore::new(20);
        let id = store.create().await;

        let created = store.info(&id).await.unwrap().last_activity;
        store.append(&id, Role::User, "a").await.unwrap();
        let after_first = store.info(&id).await.unwrap().last_activity;
        store.append(&id, Role::User, "b").await.unwrap();
        let after_second = store.info(&id).await.unwrap().last_activity;

        assert!(after_first >= created);
        assert!(after_second >= after_first);
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_stale_sessions() {
        let store = SessionStore::new(20);
        let stale = store.create().await;
        let fresh = store.create().await;
        store.append(&fresh, Role::User, "hi").await.unwrap();

        // Backdate the stale session past the age limit.
        {
            let mut sessions = store.sessions.write().await;
            sessions.get_mut(&stale).unwrap().last_activity =
                Utc::now() - Duration::hours(25);
        }

        let removed = store.sweep_expired(Duration::hours(24)).await;
        assert_eq!(removed, 1);
        assert!(store.messages(&stale).await.is_none());
        assert_eq!(store.message_count(&fresh).await, 1);
    }

    #[tokio::test]
    async fn sweep_on_empty_store_removes_nothing() {
        let store = SessionStore::new(20);
        assert_eq!(store.sweep_expired(Duration::hours(24)).await, 0);
    }

    #[tokio::test]
    async fn stats_reports_all_live_sessions() {
        let store = SessionStore::new(20);
        let a = store.create().await;
        store.create().await;
        store.append(&a, Role::User, "hello").await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total_sessions, 2);
        let info = stats.sessions.iter().find(|s| s.id == a).unwrap();
        assert_eq!(info.message_count, 1);
    }

    #[test]
    fn role_rejects_unknown_values() {
        assert!(serde_json::from_str::<Role>("\"user\"").is_ok());
        assert!(serde_json::from_str::<Role>("\"assistant\"").is_ok());
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
        assert!(serde_json::from_str::<Role>("\"User\"").is_err());
    }

    #[test]
    fn turn_serializes_with_lowercase_role() {
        let turn = Turn {
            role: Role::Assistant,
            content: "Hi!".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"timestamp\""));
    }
}
