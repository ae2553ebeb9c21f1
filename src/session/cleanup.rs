use super::store::SessionStore;
use crate::settings::EditorAuthSettings;
use crate::utils::logging::LoggingHelper;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodically removes expired sessions from a [`SessionStore`]
///
/// Completed sessions that are never polled are swept like any other, so a
/// client that never returns does not leave its credential behind.
#[derive(Clone)]
pub struct CleanupScheduler {
    store: Arc<dyn SessionStore + Send + Sync>,
    interval: Duration,
}

impl CleanupScheduler {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore + Send + Sync>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    #[must_use]
    pub fn from_settings(
        store: Arc<dyn SessionStore + Send + Sync>,
        settings: &EditorAuthSettings,
    ) -> Self {
        Self::new(
            store,
            Duration::from_secs(settings.session.cleanup_interval_seconds),
        )
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One sweep; a failure is logged and reported as nothing removed
    pub async fn run_once(&self) -> usize {
        match self.store.sweep_expired().await {
            Ok(removed) => {
                LoggingHelper::log_sweep_result(removed);
                removed
            }
            Err(e) => {
                error!("❌ Auth session cleanup sweep failed: {e}");
                0
            }
        }
    }

    /// Sweep on a fixed interval for as long as the runtime lives
    ///
    /// The first sweep runs one interval after spawning.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "🧹 Auth session cleanup scheduled every {}s",
            self.interval.as_secs_f64()
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthSession, ProviderKind, SessionUpdate, StoreError};
    use crate::session::store::InMemorySessionStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(id: &str, age_minutes: i64) -> AuthSession {
        AuthSession::pending_at(
            id.to_string(),
            "ext".to_string(),
            "1.0".to_string(),
            ProviderKind::Local,
            None,
            Utc::now() - chrono::Duration::minutes(age_minutes),
            chrono::Duration::minutes(10),
        )
    }

    /// Store whose sweep always fails, counting attempts
    #[derive(Default)]
    struct FailingStore {
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn put(&self, _session: AuthSession) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get(&self, _id: &str) -> Result<AuthSession, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn remove(&self, _id: &str) -> Result<Option<AuthSession>, StoreError> {
            Ok(None)
        }
        async fn apply_update(
            &self,
            _id: &str,
            _update: SessionUpdate,
        ) -> Result<AuthSession, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn sweep_expired(&self) -> Result<usize, StoreError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("cache unreachable".to_string()))
        }
        async fn session_count(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_default_interval_is_five_minutes() {
        let scheduler = CleanupScheduler::from_settings(
            Arc::new(InMemorySessionStore::new()),
            &EditorAuthSettings::default(),
        );
        assert_eq!(scheduler.interval(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_run_once_removes_expired() {
        let store = Arc::new(InMemorySessionStore::new());
        store.put(session("old", 30)).await.unwrap();
        store.put(session("fresh", 1)).await.unwrap();

        let scheduler = CleanupScheduler::new(store.clone(), Duration::from_secs(300));
        assert_eq!(scheduler.run_once().await, 1);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_sweeps_periodically() {
        let store = Arc::new(InMemorySessionStore::new());
        store.put(session("old", 30)).await.unwrap();

        let handle = CleanupScheduler::new(store.clone(), Duration::from_millis(20)).spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.session_count().await, 0);

        store.put(session("old-again", 30)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.session_count().await, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_sweeps_do_not_stop_the_loop() {
        let store = Arc::new(FailingStore::default());
        let handle = CleanupScheduler::new(store.clone(), Duration::from_millis(10)).spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.sweeps.load(Ordering::SeqCst) >= 2);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
