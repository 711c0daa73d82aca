//! Runtime session: the live registry of a user's view instances.
//!
//! Distinct from the `sessions` namespace of the state tree: that is a
//! serializable snapshot of view metadata; this holds the actual instances
//! plus bounded navigation history and the idle-eviction timestamp.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::view::{ViewFactory, ViewInstance};

/// One navigation history entry: the view kind plus the factory to rebuild
/// it, so `back` can reconstruct retired views.
#[derive(Clone)]
pub struct HistoryEntry {
    pub name: String,
    pub factory: ViewFactory,
}

struct SessionInner {
    views: Vec<Arc<ViewInstance>>,
    view_history: Vec<HistoryEntry>,
    last_interaction: DateTime<Utc>,
}

/// Per-user registry of live views.
pub struct Session {
    uid: u64,
    history_limit: usize,
    inner: RwLock<SessionInner>,
}

impl Session {
    pub fn new(uid: u64) -> Self {
        Self::with_history_limit(uid, 10)
    }

    pub fn with_history_limit(uid: u64, history_limit: usize) -> Self {
        Self {
            uid,
            history_limit,
            inner: RwLock::new(SessionInner {
                views: Vec::new(),
                view_history: Vec::new(),
                last_interaction: Utc::now(),
            }),
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Snapshot of the live view instances.
    pub async fn views(&self) -> Vec<Arc<ViewInstance>> {
        self.inner.read().await.views.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.views.is_empty()
    }

    /// Finds a live view by its kind name.
    pub async fn get_by_name(&self, name: &str) -> Option<Arc<ViewInstance>> {
        let inner = self.inner.read().await;
        inner.views.iter().find(|v| v.name() == name).cloned()
    }

    /// Adds or refreshes a view in the registry.
    ///
    /// If this exact instance is already present, only the interaction time
    /// is bumped. Otherwise any older instance with the same kind name is
    /// dropped first, so the registry holds at most one instance per kind.
    pub async fn set(&self, view: Arc<ViewInstance>) -> Arc<ViewInstance> {
        let mut inner = self.inner.write().await;
        inner.last_interaction = Utc::now();

        if inner.views.iter().any(|v| Arc::ptr_eq(v, &view)) {
            tracing::debug!("View '{}' already in session {}", view.name(), self.uid);
            return view;
        }

        if let Some(i) = inner
            .views
            .iter()
            .position(|v| v.name() == view.name() && !Arc::ptr_eq(v, &view))
        {
            tracing::debug!(
                "Removing older view '{}' with same name from session {}",
                view.name(),
                self.uid
            );
            inner.views.remove(i);
        }

        inner.views.push(view.clone());
        tracing::debug!("Added view '{}' to session {}", view.name(), self.uid);
        view
    }

    /// Removes a view, matching by identity first and kind name as a
    /// fallback. Returns the removed instance.
    pub async fn delete(&self, view: &Arc<ViewInstance>) -> Option<Arc<ViewInstance>> {
        let mut inner = self.inner.write().await;
        if let Some(i) = inner.views.iter().position(|v| Arc::ptr_eq(v, view)) {
            return Some(inner.views.remove(i));
        }
        let name = view.name().to_string();
        let i = inner.views.iter().position(|v| v.name() == name)?;
        Some(inner.views.remove(i))
    }

    /// Removes a view by kind name.
    pub async fn delete_by_name(&self, name: &str) -> Option<Arc<ViewInstance>> {
        let mut inner = self.inner.write().await;
        let i = inner.views.iter().position(|v| v.name() == name)?;
        Some(inner.views.remove(i))
    }

    pub async fn contains(&self, view: &Arc<ViewInstance>) -> bool {
        let inner = self.inner.read().await;
        inner.views.iter().any(|v| Arc::ptr_eq(v, view))
    }

    /// Appends a navigation entry, evicting the oldest past the cap.
    /// Consecutive entries for the same kind collapse into one.
    pub async fn add_to_history(&self, name: &str, factory: ViewFactory) {
        let mut inner = self.inner.write().await;
        if inner.view_history.last().map(|e| e.name.as_str()) == Some(name) {
            return;
        }
        inner.view_history.push(HistoryEntry {
            name: name.to_string(),
            factory,
        });
        if inner.view_history.len() > self.history_limit {
            inner.view_history.remove(0);
            tracing::debug!("Trimmed view history in session {}", self.uid);
        }
    }

    pub async fn history_len(&self) -> usize {
        self.inner.read().await.view_history.len()
    }

    /// The entry before the current one, used by back-navigation.
    pub async fn penultimate_history(&self) -> Option<HistoryEntry> {
        let inner = self.inner.read().await;
        let len = inner.view_history.len();
        if len < 2 {
            return None;
        }
        Some(inner.view_history[len - 2].clone())
    }

    /// Pops the most recent history entry.
    pub async fn pop_history(&self) -> Option<HistoryEntry> {
        self.inner.write().await.view_history.pop()
    }

    pub async fn history_names(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.view_history.iter().map(|e| e.name.clone()).collect()
    }

    pub async fn last_interaction(&self) -> DateTime<Utc> {
        self.inner.read().await.last_interaction
    }

    /// Bumps the idle-eviction clock.
    pub async fn touch(&self) {
        self.inner.write().await.last_interaction = Utc::now();
    }

    /// Overrides the idle-eviction clock. Intended for restores and tests.
    pub async fn set_last_interaction(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_interaction = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SessionManager;
    use crate::platform::RenderedMessage;
    use crate::view::{View, ViewOptions, view_factory};
    use async_trait::async_trait;
    use weft_core::{StateData, StateStore};

    struct Named(&'static str);

    #[async_trait]
    impl View for Named {
        fn kind(&self) -> &str {
            self.0
        }

        async fn render(&self, _state: Arc<StateData>) -> RenderedMessage {
            RenderedMessage::new()
        }
    }

    fn factory(name: &'static str) -> ViewFactory {
        view_factory(move || Named(name))
    }

    async fn instance(name: &'static str) -> Arc<ViewInstance> {
        ViewInstance::create(
            factory(name),
            Arc::new(StateStore::new()),
            Arc::new(SessionManager::new()),
            None,
            ViewOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_set_replaces_same_name_instance() {
        let session = Session::new(1);
        let first = instance("menu").await;
        let second = instance("menu").await;

        session.set(first.clone()).await;
        session.set(second.clone()).await;

        let views = session.views().await;
        assert_eq!(views.len(), 1);
        assert!(Arc::ptr_eq(&views[0], &second));
        assert!(!session.contains(&first).await);
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_name_match() {
        let session = Session::new(1);
        let live = instance("menu").await;
        session.set(live.clone()).await;

        // A different instance of the same kind still clears the slot.
        let stranger = instance("menu").await;
        let removed = session.delete(&stranger).await.unwrap();
        assert!(Arc::ptr_eq(&removed, &live));
        assert!(session.is_empty().await);
    }

    #[tokio::test]
    async fn test_history_bounded_to_ten_most_recent() {
        let session = Session::new(1);
        let names: Vec<String> = (0..15).map(|i| format!("view-{}", i)).collect();
        for name in &names {
            session.add_to_history(name, view_factory(|| Named("x"))).await;
        }

        assert_eq!(session.history_len().await, 10);
        assert_eq!(session.history_names().await, names[5..].to_vec());
    }

    #[tokio::test]
    async fn test_history_collapses_consecutive_duplicates() {
        let session = Session::new(1);
        session.add_to_history("menu", factory("menu")).await;
        session.add_to_history("menu", factory("menu")).await;
        session.add_to_history("settings", factory("settings")).await;
        session.add_to_history("menu", factory("menu")).await;

        assert_eq!(session.history_names().await, vec!["menu", "settings", "menu"]);
    }

    #[tokio::test]
    async fn test_penultimate_and_pop() {
        let session = Session::new(1);
        assert!(session.penultimate_history().await.is_none());

        session.add_to_history("a", factory("a")).await;
        assert!(session.penultimate_history().await.is_none());

        session.add_to_history("b", factory("b")).await;
        assert_eq!(session.penultimate_history().await.unwrap().name, "a");

        let popped = session.pop_history().await.unwrap();
        assert_eq!(popped.name, "b");
        assert_eq!(session.history_len().await, 1);
    }
}
