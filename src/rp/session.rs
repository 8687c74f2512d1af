use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::util::random::FromRandom;

use super::flow::{PendingAuth, PreparedAuth, SessionUser};

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct SessionId(pub String);

/// Per-browser state. `pending` is the single-use binding between an
/// authorization request and its callback; `user` is the authenticated
/// session materialized after a valid callback.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub pending: Option<PendingAuth>,
    pub prepared: Option<PreparedAuth>,
    pub user: Option<SessionUser>,
    pub logout_state: Option<String>,
}

/// In-memory sessions keyed by the browser cookie. Each session is only
/// ever mutated by the request serving it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the cookie to a live session, creating one as needed.
    /// Returns whether the caller has to set a fresh cookie.
    pub async fn ensure(&self, cookie: Option<String>) -> (SessionId, bool) {
        if let Some(value) = cookie {
            let id = SessionId(value);
            if self.sessions.read().await.contains_key(&id) {
                return (id, false);
            }
        }

        let id = SessionId::from_random();
        self.sessions
            .write()
            .await
            .insert(id.clone(), SessionData::default());
        (id, true)
    }

    pub async fn get(&self, id: &SessionId) -> SessionData {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn update<F>(&self, id: &SessionId, f: F)
    where
        F: FnOnce(&mut SessionData),
    {
        let mut sessions = self.sessions.write().await;
        let data = sessions.entry(id.clone()).or_default();
        f(data);
    }

    /// Consume the pending auth binding; it is valid for exactly one
    /// callback.
    pub async fn take_pending(&self, id: &SessionId) -> Option<PendingAuth> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).and_then(|data| data.pending.take())
    }

    pub async fn take_prepared(&self, id: &SessionId) -> Option<PreparedAuth> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).and_then(|data| data.prepared.take())
    }

    /// Drop everything bound to the session except the row itself, leaving
    /// the logout state for the post-logout landing to check.
    pub async fn destroy(&self, id: &SessionId, logout_state: Option<String>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id.clone(),
            SessionData {
                logout_state,
                ..SessionData::default()
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_reuses_live_sessions() {
        let store = SessionStore::new();
        let (id, created) = store.ensure(None).await;
        assert!(created);

        let (same, created) = store.ensure(Some(id.0.clone())).await;
        assert!(!created);
        assert_eq!(same, id);
    }

    #[tokio::test]
    async fn unknown_cookie_gets_fresh_session() {
        let store = SessionStore::new();
        let (id, created) = store.ensure(Some("forged-cookie".to_string())).await;
        assert!(created);
        assert_ne!(id.0, "forged-cookie");
    }

    #[tokio::test]
    async fn pending_is_single_use() {
        let store = SessionStore::new();
        let (id, _) = store.ensure(None).await;

        store
            .update(&id, |data| {
                data.pending = Some(PendingAuth {
                    state: "s1".to_string(),
                    nonce: "n1".to_string(),
                    code_verifier: None,
                });
            })
            .await;

        assert!(store.take_pending(&id).await.is_some());
        assert!(store.take_pending(&id).await.is_none());
    }

    #[tokio::test]
    async fn destroy_clears_user_but_keeps_logout_state() {
        let store = SessionStore::new();
        let (id, _) = store.ensure(None).await;

        store
            .update(&id, |data| {
                data.user = Some(SessionUser::default());
            })
            .await;

        store.destroy(&id, Some("ls-1".to_string())).await;
        let data = store.get(&id).await;
        assert!(data.user.is_none());
        assert_eq!(data.logout_state.as_deref(), Some("ls-1"));
    }
}
