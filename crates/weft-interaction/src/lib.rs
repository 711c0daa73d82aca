//! Interaction layer for Weft: platform ports, per-user sessions, the
//! session manager, the view lifecycle engine, and the stateful control
//! adapter.
//!
//! Hosts construct one [`WeftRuntime`] at startup and hand its `Arc`s to
//! whatever registers commands; there are no hidden globals.

pub mod control;
pub mod manager;
pub mod platform;
pub mod session;
pub mod view;

pub use control::{Control, ControlCallback, ControlValue, control_callback, stateful_callback};
pub use manager::{Middleware, SessionKey, SessionManager, middleware};
pub use platform::{
    ControlsState, Embed, PlatformError, PlatformInteraction, PlatformMessage, RenderedMessage,
};
pub use session::{HistoryEntry, Session};
pub use view::{View, ViewFactory, ViewInstance, ViewOptions, ViewPhase, view_factory};

use std::sync::Arc;
use weft_core::{StateStore, WeftConfig};

/// Composition root: one store and one manager per process, created at
/// startup and disposed at shutdown.
pub struct WeftRuntime {
    config: WeftConfig,
    store: Arc<StateStore>,
    manager: Arc<SessionManager>,
}

impl WeftRuntime {
    pub fn new() -> Self {
        Self::with_config(WeftConfig::default())
    }

    pub fn with_config(config: WeftConfig) -> Self {
        Self {
            store: Arc::new(StateStore::with_config(config.clone())),
            manager: Arc::new(SessionManager::with_config(config.clone())),
            config,
        }
    }

    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// View options seeded from the configured defaults.
    pub fn default_options(&self) -> ViewOptions {
        ViewOptions {
            ephemeral: self.config.ephemeral_default,
            ..ViewOptions::default()
        }
    }

    /// Convenience wrapper around [`ViewInstance::create`] using this
    /// runtime's store and manager.
    pub async fn create_view(
        &self,
        factory: ViewFactory,
        interaction: Option<Arc<dyn PlatformInteraction>>,
        options: ViewOptions,
    ) -> weft_core::Result<Arc<ViewInstance>> {
        ViewInstance::create(
            factory,
            self.store.clone(),
            self.manager.clone(),
            interaction,
            options,
        )
        .await
    }

    /// Drops all subscribers and aborts tracked background tasks.
    pub async fn shutdown(&self) {
        self.store.clear_subscribers().await;
        let aborted = self.manager.tasks().cancel_all();
        if aborted > 0 {
            tracing::debug!("Aborted {} background tasks at shutdown", aborted);
        }
    }
}

impl Default for WeftRuntime {
    fn default() -> Self {
        Self::new()
    }
}
