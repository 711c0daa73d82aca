//! Central dispatch store: reducers, subscribers, bounded action history.
//!
//! The store is an explicitly constructed instance owned by the application's
//! composition root and shared as `Arc<StateStore>`; there is no hidden
//! global. The state tree is treated as immutable and swapped wholesale per
//! dispatch, which substitutes for fine-grained locking.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::action::{Action, ActionPayload};
use crate::config::WeftConfig;
use crate::error::Result;
use crate::state::model::StateData;
use crate::state::reducers::reduce_core;
use crate::storage::StorageBackend;
use crate::tasks::TaskTracker;

/// A pure async function computing new state from current state and an
/// action. Returning the input `Arc` signals "no change".
pub type ReducerFn =
    Arc<dyn Fn(Action, Arc<StateData>) -> BoxFuture<'static, Result<Arc<StateData>>> + Send + Sync>;

/// Callback notified after every dispatch with the resulting snapshot.
pub type SubscriberFn =
    Arc<dyn Fn(Arc<StateData>, Action) -> BoxFuture<'static, ()> + Send + Sync>;

/// Boxes a plain async function as a [`ReducerFn`].
pub fn reducer<F, Fut>(f: F) -> ReducerFn
where
    F: Fn(Action, Arc<StateData>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<StateData>>> + Send + 'static,
{
    Arc::new(move |action, state| Box::pin(f(action, state)))
}

/// Boxes a plain async function as a [`SubscriberFn`].
pub fn subscriber<F, Fut>(f: F) -> SubscriberFn
where
    F: Fn(Arc<StateData>, Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |state, action| Box::pin(f(state, action)))
}

/// Per-dispatch options.
///
/// `skip_source` is an explicit opt-in: by default every subscriber is
/// notified, including the dispatch's own source.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub skip_source: bool,
}

/// Central state manager for the coordination layer.
pub struct StateStore {
    config: WeftConfig,
    /// Current snapshot; replaced wholesale per dispatch.
    state: RwLock<Arc<StateData>>,
    /// Custom reducers, shadowing the built-in ones per action type.
    custom_reducers: RwLock<HashMap<String, ReducerFn>>,
    /// Subscribers keyed by id (typically a view id).
    subscribers: RwLock<HashMap<String, SubscriberFn>>,
    /// Bounded ring of dispatched actions, for debugging.
    history: Mutex<VecDeque<Action>>,
    /// Optional snapshot backend; saves are fire-and-forget.
    persistence: RwLock<Option<Arc<dyn StorageBackend>>>,
    /// Serializes reduce-and-swap so each reducer observes a settled tree.
    dispatch_lock: tokio::sync::Mutex<()>,
    tasks: TaskTracker,
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_config(WeftConfig::default())
    }

    pub fn with_config(config: WeftConfig) -> Self {
        Self {
            config,
            state: RwLock::new(Arc::new(StateData::default())),
            custom_reducers: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            persistence: RwLock::new(None),
            dispatch_lock: tokio::sync::Mutex::new(()),
            tasks: TaskTracker::new(),
        }
    }

    /// Returns the current state snapshot.
    pub async fn state(&self) -> Arc<StateData> {
        self.state.read().await.clone()
    }

    /// Returns the retained action history, oldest first.
    pub fn history(&self) -> Vec<Action> {
        let history = self.history.lock().expect("history ring poisoned");
        history.iter().cloned().collect()
    }

    /// Registers a custom reducer for an action type. Last registration
    /// wins; for core action types the custom reducer shadows the built-in.
    pub async fn register_reducer(&self, action_type: impl Into<String>, reducer: ReducerFn) {
        let action_type = action_type.into();
        tracing::debug!("Registering reducer for '{}'", action_type);
        self.custom_reducers
            .write()
            .await
            .insert(action_type, reducer);
    }

    /// Removes a custom reducer. Core action types fall back to the
    /// built-in reducer; custom types become no-ops.
    pub async fn unregister_reducer(&self, action_type: &str) {
        self.custom_reducers.write().await.remove(action_type);
    }

    /// Registers a subscriber under `subscriber_id`, replacing any prior
    /// callback for that id.
    pub async fn subscribe(&self, subscriber_id: impl Into<String>, callback: SubscriberFn) {
        self.subscribers
            .write()
            .await
            .insert(subscriber_id.into(), callback);
    }

    /// Removes a subscriber. Idempotent.
    pub async fn unsubscribe(&self, subscriber_id: &str) {
        self.subscribers.write().await.remove(subscriber_id);
    }

    /// Drops every subscriber. Used at shutdown.
    pub async fn clear_subscribers(&self) {
        self.subscribers.write().await.clear();
    }

    /// Dispatches with default options (all subscribers notified).
    pub async fn dispatch(
        &self,
        payload: ActionPayload,
        source: Option<String>,
    ) -> Arc<StateData> {
        self.dispatch_with(payload, source, DispatchOptions::default())
            .await
    }

    /// Processes an action: appends it to history, applies the matching
    /// reducer, swaps the state slot, notifies subscribers, and triggers a
    /// best-effort persistence save for lifecycle actions.
    ///
    /// A missing reducer and a failing reducer both leave the state
    /// unchanged; neither fails the dispatch. Returns the resulting
    /// snapshot.
    pub async fn dispatch_with(
        &self,
        payload: ActionPayload,
        source: Option<String>,
        options: DispatchOptions,
    ) -> Arc<StateData> {
        let action = Action::new(payload, source);
        self.record_history(action.clone());

        let next = {
            let _serial = self.dispatch_lock.lock().await;
            let current = self.state.read().await.clone();

            let custom = {
                let reducers = self.custom_reducers.read().await;
                reducers.get(action.action_type()).cloned()
            };

            let next = match custom {
                Some(reducer) => match reducer(action.clone(), current.clone()).await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::error!(
                            "Reducer for '{}' failed, keeping previous state: {}",
                            action.action_type(),
                            e
                        );
                        current.clone()
                    }
                },
                None => {
                    if matches!(action.payload, ActionPayload::Custom { .. }) {
                        tracing::debug!(
                            "No reducer registered for '{}', state unchanged",
                            action.action_type()
                        );
                    }
                    reduce_core(&action, current.clone()).await
                }
            };

            *self.state.write().await = next.clone();
            next
        };

        self.notify_subscribers(next.clone(), action.clone(), options)
            .await;
        self.maybe_persist(&action).await;

        next
    }

    fn record_history(&self, action: Action) {
        let mut history = self.history.lock().expect("history ring poisoned");
        history.push_back(action);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }

    /// Fans out one task per subscriber and awaits them all. A panicking or
    /// slow subscriber cannot break the others or the dispatch caller.
    async fn notify_subscribers(
        &self,
        state: Arc<StateData>,
        action: Action,
        options: DispatchOptions,
    ) {
        let subscribers: Vec<(String, SubscriberFn)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, cb)| (id.clone(), cb.clone()))
                .collect()
        };

        let mut handles = Vec::new();
        for (subscriber_id, callback) in subscribers {
            if options.skip_source && action.source.as_deref() == Some(subscriber_id.as_str()) {
                continue;
            }
            let future = callback(state.clone(), action.clone());
            handles.push((subscriber_id, tokio::spawn(future)));
        }

        for (subscriber_id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!("Error notifying subscriber '{}': {}", subscriber_id, e);
            }
        }
    }

    /// Enables snapshot persistence with the given backend.
    pub async fn enable_persistence(&self, backend: Arc<dyn StorageBackend>) {
        *self.persistence.write().await = Some(backend);
    }

    /// Replaces the in-memory tree with the last persisted snapshot, if the
    /// backend has one. Failures are logged and leave the tree untouched.
    pub async fn restore_state(&self) {
        let backend = self.persistence.read().await.clone();
        let Some(backend) = backend else {
            return;
        };
        match backend.load_state().await {
            Ok(Some(restored)) => {
                *self.state.write().await = Arc::new(restored);
                tracing::info!("State restored from persistence backend");
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Error restoring state: {}", e),
        }
    }

    async fn maybe_persist(&self, action: &Action) {
        if !persisted_action(&action.payload) {
            return;
        }
        let backend = self.persistence.read().await.clone();
        let Some(backend) = backend else {
            return;
        };
        let snapshot = self.state.read().await.clone();
        self.tasks.spawn("store-persistence", async move {
            if let Err(e) = backend.save_state(&snapshot).await {
                tracing::error!("Error persisting state: {}", e);
            }
        });
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle and navigation actions trigger a snapshot save; component
/// chatter and custom actions do not.
fn persisted_action(payload: &ActionPayload) -> bool {
    matches!(
        payload,
        ActionPayload::ViewCreated { .. }
            | ActionPayload::ViewUpdated { .. }
            | ActionPayload::ViewDestroyed { .. }
            | ActionPayload::SessionCreated { .. }
            | ActionPayload::SessionUpdated { .. }
            | ActionPayload::Navigation { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeftError;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_history_bounded_to_limit_most_recent_in_order() {
        let store = StateStore::new();
        for i in 0..150 {
            store
                .dispatch(ActionPayload::custom(format!("TICK_{i}")), None)
                .await;
        }
        let history = store.history();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].action_type(), "TICK_50");
        assert_eq!(history[99].action_type(), "TICK_149");
    }

    #[tokio::test]
    async fn test_custom_reducer_register_and_unregister() {
        let store = StateStore::new();
        store
            .register_reducer(
                "PING",
                reducer(|_action, state: Arc<StateData>| async move {
                    let mut next = (*state).clone();
                    next.application.insert("pong".into(), Value::Bool(true));
                    Ok(Arc::new(next))
                }),
            )
            .await;

        let state = store.dispatch(ActionPayload::custom("PING"), None).await;
        assert_eq!(state.application["pong"], Value::Bool(true));

        store.unregister_reducer("PING").await;
        let state = store.dispatch(ActionPayload::custom("PING"), None).await;
        // Reducer absent leaves state unchanged, not reset.
        assert_eq!(state.application["pong"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_failing_reducer_keeps_previous_state() {
        let store = StateStore::new();
        store
            .dispatch(
                ActionPayload::SessionCreated {
                    session_id: "s1".into(),
                    user_id: None,
                    data: Map::new(),
                },
                None,
            )
            .await;

        store
            .register_reducer(
                "BOOM",
                reducer(|_action, _state| async move {
                    Err(WeftError::internal("reducer exploded"))
                }),
            )
            .await;
        let state = store.dispatch(ActionPayload::custom("BOOM"), None).await;
        assert!(state.sessions.contains_key("s1"));
    }

    #[tokio::test]
    async fn test_custom_reducer_shadows_core_and_restores_on_unregister() {
        let store = StateStore::new();
        store
            .register_reducer(
                "SESSION_CREATED",
                reducer(|_action, state| async move { Ok(state) }),
            )
            .await;
        let state = store
            .dispatch(
                ActionPayload::SessionCreated {
                    session_id: "s1".into(),
                    user_id: None,
                    data: Map::new(),
                },
                None,
            )
            .await;
        assert!(state.sessions.is_empty());

        store.unregister_reducer("SESSION_CREATED").await;
        let state = store
            .dispatch(
                ActionPayload::SessionCreated {
                    session_id: "s1".into(),
                    user_id: None,
                    data: Map::new(),
                },
                None,
            )
            .await;
        assert!(state.sessions.contains_key("s1"));
    }

    #[tokio::test]
    async fn test_subscriber_isolation() {
        let store = StateStore::new();
        let seen = Arc::new(AtomicUsize::new(0));

        store
            .subscribe(
                "bad",
                subscriber(|_state, _action| async move {
                    panic!("misbehaving subscriber");
                }),
            )
            .await;
        let counter = seen.clone();
        store
            .subscribe(
                "good",
                subscriber(move |_state, _action| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        store.dispatch(ActionPayload::custom("PING"), None).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skip_source_opt_in() {
        let store = StateStore::new();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        store
            .subscribe(
                "v1",
                subscriber(move |_state, _action| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        // Default: the source is notified like everyone else.
        store
            .dispatch(ActionPayload::custom("PING"), Some("v1".into()))
            .await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        store
            .dispatch_with(
                ActionPayload::custom("PING"),
                Some("v1".into()),
                DispatchOptions { skip_source: true },
            )
            .await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    struct CountingBackend {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl StorageBackend for CountingBackend {
        async fn save_state(&self, _state: &StateData) -> crate::error::Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn load_state(&self) -> crate::error::Result<Option<StateData>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_persistence_fires_for_lifecycle_actions_only() {
        let store = StateStore::new();
        let backend = Arc::new(CountingBackend {
            saves: AtomicUsize::new(0),
        });
        store.enable_persistence(backend.clone()).await;

        store
            .dispatch(
                ActionPayload::SessionCreated {
                    session_id: "s1".into(),
                    user_id: None,
                    data: Map::new(),
                },
                None,
            )
            .await;
        store
            .dispatch(
                ActionPayload::ComponentInteraction {
                    component_id: "c1".into(),
                    view_id: "v1".into(),
                    user_id: None,
                    value: Value::Bool(true),
                },
                None,
            )
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(backend.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_referential_integrity_over_mixed_sequence() {
        let store = StateStore::new();
        for session in ["s1", "s2"] {
            store
                .dispatch(
                    ActionPayload::SessionCreated {
                        session_id: session.into(),
                        user_id: None,
                        data: Map::new(),
                    },
                    None,
                )
                .await;
        }
        for (view, session) in [("v1", "s1"), ("v2", "s1"), ("v3", "s2")] {
            store
                .dispatch(
                    ActionPayload::ViewCreated {
                        view_id: view.into(),
                        view_type: "X".into(),
                        user_id: None,
                        session_id: Some(session.into()),
                        props: Map::new(),
                    },
                    None,
                )
                .await;
        }
        let state = store
            .dispatch(
                ActionPayload::ViewDestroyed {
                    view_id: "v2".into(),
                },
                None,
            )
            .await;

        for session in state.sessions.values() {
            for view_id in &session.views {
                assert!(state.views.contains_key(view_id));
            }
        }
        for view in state.views.values() {
            if let Some(session_id) = &view.session_id {
                assert!(state.sessions[session_id].views.contains(&view.id));
            }
        }
    }
}
