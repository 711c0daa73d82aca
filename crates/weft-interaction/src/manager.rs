//! Process-wide session registry with idle eviction, interaction middleware,
//! and the duplicate-view protocol.

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use weft_core::{Result, TaskTracker, WeftConfig};

use crate::platform::PlatformInteraction;
use crate::session::Session;
use crate::view::ViewInstance;

/// Async transform applied to every inbound interaction before lifecycle
/// handling. A failing middleware is skipped; the chain continues with the
/// last good value.
pub type Middleware = Arc<
    dyn Fn(Arc<dyn PlatformInteraction>) -> BoxFuture<'static, Result<Arc<dyn PlatformInteraction>>>
        + Send
        + Sync,
>;

/// Boxes a plain async function as a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Arc<dyn PlatformInteraction>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn PlatformInteraction>>> + Send + 'static,
{
    Arc::new(move |interaction| Box::pin(f(interaction)))
}

/// Normalized lookup key: a raw user id or a session's own uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(pub u64);

impl From<u64> for SessionKey {
    fn from(uid: u64) -> Self {
        Self(uid)
    }
}

impl From<&Session> for SessionKey {
    fn from(session: &Session) -> Self {
        Self(session.uid())
    }
}

impl From<&Arc<Session>> for SessionKey {
    fn from(session: &Arc<Session>) -> Self {
        Self(session.uid())
    }
}

/// Manages per-user sessions and their lifecycle.
///
/// `SessionManager` is responsible for:
/// - Storing at most one [`Session`] per user
/// - Evicting idle sessions (rate-limited sweep)
/// - Running the interaction middleware chain
/// - The duplicate-view check that keeps at most one live instance per
///   (user, view kind) pair
/// - Tracking which instance handled which interaction id
pub struct SessionManager {
    config: WeftConfig,
    sessions: RwLock<HashMap<u64, Arc<Session>>>,
    middlewares: RwLock<Vec<Middleware>>,
    /// Interaction id to handling view-instance id.
    processed_interactions: Mutex<HashMap<u64, String>>,
    /// None until the first sweep, so the first call always runs.
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
    /// Owner-keyed background tasks spawned on behalf of view instances.
    tasks: Arc<TaskTracker>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_config(WeftConfig::default())
    }

    pub fn with_config(config: WeftConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            middlewares: RwLock::new(Vec::new()),
            processed_interactions: Mutex::new(HashMap::new()),
            last_cleanup: Mutex::new(None),
            tasks: Arc::new(TaskTracker::new()),
        }
    }

    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    /// Tracker for background tasks keyed by their owning view instance.
    pub fn tasks(&self) -> &Arc<TaskTracker> {
        &self.tasks
    }

    /// Looks up a session by user id or session reference.
    pub async fn get(&self, key: impl Into<SessionKey>) -> Option<Arc<Session>> {
        let SessionKey(uid) = key.into();
        self.sessions.read().await.get(&uid).cloned()
    }

    /// Stores a session under its own uid, overwriting any prior entry.
    pub async fn set(&self, session: Arc<Session>) -> Arc<Session> {
        self.sessions
            .write()
            .await
            .insert(session.uid(), session.clone());
        session
    }

    /// Removes and returns the session for a user.
    pub async fn delete(&self, key: impl Into<SessionKey>) -> Option<Arc<Session>> {
        let SessionKey(uid) = key.into();
        self.sessions.write().await.remove(&uid)
    }

    pub async fn contains(&self, key: impl Into<SessionKey>) -> bool {
        let SessionKey(uid) = key.into();
        self.sessions.read().await.contains_key(&uid)
    }

    /// Returns the user's session, creating and registering one if absent.
    pub async fn get_or_create(&self, uid: u64) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(uid)
            .or_insert_with(|| {
                tracing::debug!("Created new session for user {}", uid);
                Arc::new(Session::with_history_limit(
                    uid,
                    self.config.view_history_limit,
                ))
            })
            .clone()
    }

    /// Duplicate-view check for a freshly constructed instance.
    ///
    /// If the interaction user's session already holds a live instance of
    /// the same kind, the new instance is flagged as a duplicate (its own
    /// handling path becomes a no-op) and the existing instance is
    /// returned so the caller can adopt the interaction onto it. This is
    /// what keeps at most one interaction-handling instance per
    /// (user, view kind) pair.
    pub async fn check_for_existing_view(
        &self,
        view: &Arc<ViewInstance>,
    ) -> Option<Arc<ViewInstance>> {
        let interaction = view.current_interaction().await?;
        let session = self.get(interaction.user_id()).await?;

        for existing in session.views().await {
            if !Arc::ptr_eq(&existing, view) && existing.name() == view.name() {
                tracing::debug!(
                    "Found existing view '{}' for user {}, superseding the new instance",
                    view.name(),
                    interaction.user_id()
                );
                view.mark_duplicate().await;
                return Some(existing);
            }
        }
        None
    }

    /// Appends a middleware to the interaction-processing chain.
    pub async fn add_middleware(&self, middleware: Middleware) {
        self.middlewares.write().await.push(middleware);
    }

    /// Runs an interaction through the middleware chain. A middleware
    /// error is logged and its output discarded; the chain continues with
    /// the last good value.
    pub async fn process_interaction(
        &self,
        interaction: Arc<dyn PlatformInteraction>,
    ) -> Arc<dyn PlatformInteraction> {
        let middlewares = self.middlewares.read().await.clone();
        let mut processed = interaction;
        for middleware in middlewares {
            match middleware(processed.clone()).await {
                Ok(next) => processed = next,
                Err(e) => tracing::error!("Middleware error: {}", e),
            }
        }
        processed
    }

    /// Evicts sessions idle longer than `max_age_minutes`.
    ///
    /// Rate-limited: runs at most once per configured cleanup interval
    /// regardless of call frequency, so it can be invoked opportunistically
    /// on every interaction. Returns the number of sessions evicted.
    pub async fn cleanup_old_sessions(&self, max_age_minutes: i64) -> usize {
        let now = Utc::now();
        {
            let mut last = self.last_cleanup.lock().expect("cleanup clock poisoned");
            if let Some(previous) = *last
                && now - previous < Duration::seconds(self.config.cleanup_interval_secs)
            {
                return 0;
            }
            *last = Some(now);
        }

        let mut expired = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (uid, session) in sessions.iter() {
                let age = now - session.last_interaction().await;
                if age > Duration::minutes(max_age_minutes) {
                    expired.push(*uid);
                }
            }
        }

        let mut count = 0;
        let mut sessions = self.sessions.write().await;
        for uid in expired {
            if sessions.remove(&uid).is_some() {
                count += 1;
                tracing::debug!("Cleaned up inactive session '{}'", uid);
            }
        }
        count
    }

    /// Records which instance is handling an interaction id.
    pub(crate) fn mark_processed(&self, interaction_id: u64, view_instance_id: &str) {
        self.processed_interactions
            .lock()
            .expect("interaction table poisoned")
            .insert(interaction_id, view_instance_id.to_string());
    }

    /// Clears the tracking entry, but only if it still belongs to the
    /// given instance.
    pub(crate) fn clear_processed(&self, interaction_id: u64, view_instance_id: &str) {
        let mut table = self
            .processed_interactions
            .lock()
            .expect("interaction table poisoned");
        if table.get(&interaction_id).map(String::as_str) == Some(view_instance_id) {
            table.remove(&interaction_id);
        }
    }

    /// Which instance id handled an interaction, if any.
    pub fn processed_by(&self, interaction_id: u64) -> Option<String> {
        self.processed_interactions
            .lock()
            .expect("interaction table poisoned")
            .get(&interaction_id)
            .cloned()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_by_uid_or_session() {
        let manager = SessionManager::new();
        let session = Arc::new(Session::new(42));
        manager.set(session.clone()).await;

        assert!(manager.contains(42u64).await);
        assert!(manager.contains(&session).await);
        let fetched = manager.get(42u64).await.unwrap();
        assert_eq!(fetched.uid(), 42);

        let deleted = manager.delete(&session).await.unwrap();
        assert_eq!(deleted.uid(), 42);
        assert!(!manager.contains(42u64).await);
    }

    #[tokio::test]
    async fn test_get_or_create_holds_one_session_per_user() {
        let manager = SessionManager::new();
        let a = manager.get_or_create(7).await;
        let b = manager.get_or_create(7).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_cleanup_rate_limited() {
        let manager = SessionManager::new();
        let session = Arc::new(Session::new(1));
        session
            .set_last_interaction(Utc::now() - Duration::minutes(61))
            .await;
        manager.set(session).await;

        // First sweep evicts; a second one within the interval does not run.
        assert_eq!(manager.cleanup_old_sessions(60).await, 1);

        let stale = Arc::new(Session::new(2));
        stale
            .set_last_interaction(Utc::now() - Duration::minutes(61))
            .await;
        manager.set(stale).await;
        assert_eq!(manager.cleanup_old_sessions(60).await, 0);
        assert!(manager.contains(2u64).await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_sessions() {
        let manager = SessionManager::new();
        manager.get_or_create(1).await;
        let stale = Arc::new(Session::new(2));
        stale
            .set_last_interaction(Utc::now() - Duration::minutes(90))
            .await;
        manager.set(stale).await;

        assert_eq!(manager.cleanup_old_sessions(60).await, 1);
        assert!(manager.contains(1u64).await);
        assert!(!manager.contains(2u64).await);
    }

    #[tokio::test]
    async fn test_processed_interaction_table() {
        let manager = SessionManager::new();
        manager.mark_processed(10, "view-a");
        assert_eq!(manager.processed_by(10).as_deref(), Some("view-a"));

        // A different owner must not clear the entry.
        manager.clear_processed(10, "view-b");
        assert_eq!(manager.processed_by(10).as_deref(), Some("view-a"));

        manager.clear_processed(10, "view-a");
        assert!(manager.processed_by(10).is_none());
    }
}
