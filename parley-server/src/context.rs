//! Context projection.
//!
//! Decouples what the store retains (full turns with timestamps) from what
//! the inference backend accepts (role/content pairs only). Truncation is
//! owned by the store's append-time bound; the projection always reflects
//! exactly what the store currently retains.

use crate::provider::ChatMessage;
use crate::session::{Session, SessionStore};

use crate::error::ServerError;

/// Project a session's retained turns, in chronological order, into the
/// shape the inference backend expects.
pub fn build_context(session: &Session) -> Vec<ChatMessage> {
    session
        .messages
        .iter()
        .map(|turn| ChatMessage {
            role: turn.role,
            content: turn.content.clone(),
        })
        .collect()
}

impl SessionStore {
    /// Build the inference context for a session.
    ///
    /// This feeds the mutating send-message path, so an unknown id fails
    /// with `SessionNotFound` rather than defaulting to empty.
    pub async fn context(&self, id: &str) -> Result<Vec<ChatMessage>, ServerError> {
        let session = self
            .get(id)
            .await
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;
        Ok(build_context(&session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn context_drops_timestamps_and_keeps_order() {
        let store = SessionStore::new(20);
        let id = store.create().await;
        store.append(&id, Role::User, "Hello").await.unwrap();
        store.append(&id, Role::Assistant, "Hi there!").await.unwrap();

        let context = store.context(&id).await.unwrap();
        assert_eq!(
            context,
            vec![
                ChatMessage {
                    role: Role::User,
                    content: "Hello".into()
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: "Hi there!".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn context_reflects_retained_suffix_only() {
        let store = SessionStore::new(3);
        let id = store.create().await;
        for i in 0..5 {
            store
                .append(&id, Role::User, format!("m{}", i))
                .await
                .unwrap();
        }

        let context = store.context(&id).await.unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[0].content, "m2");
        assert_eq!(context[2].content, "m4");
    }

    #[tokio::test]
    async fn context_for_unknown_id_fails() {
        let store = SessionStore::new(20);
        let err = store.context("missing").await.unwrap_err();
        assert!(matches!(err, ServerError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn empty_session_yields_empty_context() {
        let store = SessionStore::new(20);
        let id = store.create().await;
        assert!(store.context(&id).await.unwrap().is_empty());
    }
}
