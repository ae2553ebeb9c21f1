//! Session storage
//!
//! The [`SessionStore`] trait is the single synchronization point for
//! session records. Callers never lock anything themselves; every operation
//! is linearizable with respect to every other one. The in-memory
//! implementation backs a single instance; a shared cache can implement the
//! same trait for multi-instance deployments as long as it keeps the TTL
//! and single-use semantics.

use crate::models::{AuthSession, SessionUpdate, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite a session by id
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the session id is empty
    async fn put(&self, session: AuthSession) -> Result<(), StoreError>;

    /// Fetch a live session
    ///
    /// An expired record is removed as a side effect and reported as missing.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is empty, absent, or expired
    async fn get(&self, id: &str) -> Result<AuthSession, StoreError>;

    /// Idempotent removal
    ///
    /// # Errors
    /// Returns `InvalidArgument` only if the id is empty
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Atomically remove a session and hand back the live record, if any
    ///
    /// An expired record is removed too but reported as `None`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the id is empty
    async fn remove(&self, id: &str) -> Result<Option<AuthSession>, StoreError>;

    /// Apply a partial update to a live session and return the result
    ///
    /// # Errors
    /// Returns `NotFound` if the session is missing or expired, and
    /// `Conflict` if the update's precondition does not hold
    async fn apply_update(&self, id: &str, update: SessionUpdate)
        -> Result<AuthSession, StoreError>;

    /// Delete every session whose expiry has passed, returning how many went
    ///
    /// # Errors
    /// Returns `Backend` if the backing storage fails
    async fn sweep_expired(&self) -> Result<usize, StoreError>;

    /// Number of records currently held, expired or not
    async fn session_count(&self) -> usize;
}

/// Process-local session store guarded by a read/write lock
///
/// Readers (`get`) share the lock; every mutation takes it exclusively.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: AuthSession) -> Result<(), StoreError> {
        if session.id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "session id is empty".to_string(),
            ));
        }

        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session);
        debug!("Stored auth session: {id}");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<AuthSession, StoreError> {
        if id.is_empty() {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Err(StoreError::NotFound),
                Some(session) if !session.is_expired_at(now) => return Ok(session.clone()),
                Some(_) => {}
            }
        }

        // Expired: upgrade to a write lock and drop it, unless it was replaced meanwhile
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(id)
            .is_some_and(|session| session.is_expired_at(now))
        {
            sessions.remove(id);
            debug!("Removed expired auth session on access: {id}");
        }
        Err(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.remove(id).await.map(|_| ())
    }

    async fn remove(&self, id: &str) -> Result<Option<AuthSession>, StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "session id is empty".to_string(),
            ));
        }

        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!("Deleted auth session: {id}");
        }
        Ok(removed.filter(|session| !session.is_expired()))
    }

    async fn apply_update(
        &self,
        id: &str,
        update: SessionUpdate,
    ) -> Result<AuthSession, StoreError> {
        if id.is_empty() {
            return Err(StoreError::NotFound);
        }

        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            return Err(StoreError::NotFound);
        };

        if session.is_expired() {
            sessions.remove(id);
            debug!("Removed expired auth session on update: {id}");
            return Err(StoreError::NotFound);
        }

        if !update.precondition_holds(session) {
            return Err(StoreError::Conflict);
        }

        update.apply_to(session);
        debug!("Updated auth session: {id}");
        Ok(session.clone())
    }

    async fn sweep_expired(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.expires_at < now;
            if expired {
                debug!("Cleaned up expired auth session: {id}");
            }
            !expired
        });
        Ok(before - sessions.len())
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderKind, SessionCredential, SessionStatus};
    use chrono::Duration;
    use std::sync::Arc;

    fn session_with_ttl(id: &str, ttl: Duration) -> AuthSession {
        AuthSession::new_pending(
            id.to_string(),
            "ext".to_string(),
            "1.0".to_string(),
            ProviderKind::Local,
            None,
            ttl,
        )
    }

    fn expired_session(id: &str) -> AuthSession {
        AuthSession::pending_at(
            id.to_string(),
            "ext".to_string(),
            "1.0".to_string(),
            ProviderKind::Local,
            None,
            Utc::now() - Duration::minutes(20),
            Duration::minutes(10),
        )
    }

    fn credential() -> SessionCredential {
        SessionCredential {
            secret: "s3cret".to_string(),
            name: "VSCode Extension".to_string(),
            user_id: 1,
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        let session = store.get("a").await.unwrap();
        assert_eq!(session.id, "a");
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_put_rejects_empty_id() {
        let store = InMemorySessionStore::new();
        let result = store.put(session_with_ttl("", Duration::minutes(10))).await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();
        let mut replacement = session_with_ttl("a", Duration::minutes(10));
        replacement.client_name = "replaced".to_string();
        store.put(replacement).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().client_name, "replaced");
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_or_empty_is_not_found() {
        let store = InMemorySessionStore::new();
        assert!(matches!(store.get("nope").await, Err(StoreError::NotFound)));
        assert!(matches!(store.get("").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_get_expired_removes_record() {
        let store = InMemorySessionStore::new();
        store.put(expired_session("old")).await.unwrap();
        assert_eq!(store.session_count().await, 1);

        assert!(matches!(store.get("old").await, Err(StoreError::NotFound)));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_completed_session_is_invisible() {
        let store = InMemorySessionStore::new();
        let mut session = expired_session("done");
        session.status = SessionStatus::Completed;
        session.credential = Some(credential());
        store.put(session).await.unwrap();

        assert!(matches!(store.get("done").await, Err(StoreError::NotFound)));
        assert!(store.remove("done").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(matches!(
            store.delete("").await,
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_returns_record_once() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        assert!(store.remove("a").await.unwrap().is_some());
        assert!(store.remove("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_update_completes_session() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        let updated = store
            .apply_update("a", SessionUpdate::complete(credential(), None))
            .await
            .unwrap();
        assert_eq!(updated.status, SessionStatus::Completed);
        assert_eq!(store.get("a").await.unwrap().credential, Some(credential()));
    }

    #[tokio::test]
    async fn test_apply_update_only_touches_supplied_fields() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        let update = SessionUpdate {
            provider_url: Some("https://coder.example.com".to_string()),
            ..SessionUpdate::default()
        };
        let updated = store.apply_update("a", update).await.unwrap();
        assert_eq!(updated.status, SessionStatus::Pending);
        assert!(updated.credential.is_none());
        assert_eq!(
            updated.provider_url.as_deref(),
            Some("https://coder.example.com")
        );
    }

    #[tokio::test]
    async fn test_apply_update_missing_or_expired() {
        let store = InMemorySessionStore::new();
        store.put(expired_session("old")).await.unwrap();

        assert!(matches!(
            store.apply_update("nope", SessionUpdate::default()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.apply_update("old", SessionUpdate::default()).await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_completion_conflicts() {
        let store = InMemorySessionStore::new();
        store
            .put(session_with_ttl("a", Duration::minutes(10)))
            .await
            .unwrap();

        store
            .apply_update("a", SessionUpdate::complete(credential(), None))
            .await
            .unwrap();
        let mut other = credential();
        other.secret = "another".to_string();
        let second = store
            .apply_update("a", SessionUpdate::complete(other, None))
            .await;

        assert!(matches!(second, Err(StoreError::Conflict)));
        assert_eq!(
            store.get("a").await.unwrap().credential.unwrap().secret,
            "s3cret"
        );
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = InMemorySessionStore::new();
        store.put(expired_session("old-1")).await.unwrap();
        store.put(expired_session("old-2")).await.unwrap();
        store
            .put(session_with_ttl("fresh", Duration::minutes(10)))
            .await
            .unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 2);
        assert_eq!(store.session_count().await, 1);
        assert!(store.get("fresh").await.is_ok());
        assert_eq!(store.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_completions_yield_one_winner() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .put(session_with_ttl("race", Duration::minutes(10)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut cred = credential();
                cred.secret = format!("secret-{i}");
                store
                    .apply_update("race", SessionUpdate::complete(cred, None))
                    .await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(session) => winners.push(session),
                Err(e) => assert!(matches!(e, StoreError::Conflict)),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.get("race").await.unwrap();
        assert_eq!(stored.credential, winners[0].credential);
    }
}
