//! Stateful control adapter.
//!
//! Controls (buttons, selects, text inputs) are not modeled as widget
//! subclasses; any renderer-side widget participates by implementing the
//! [`Control`] capability and wrapping its callback with
//! [`stateful_callback`], which dispatches a `COMPONENT_INTERACTION` action
//! before invoking the user's handler. State synchronization is best-effort
//! and never a hard dependency for basic widget function.

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::{Arc, Weak};

use weft_core::{ActionPayload, Result, StateStore};

use crate::platform::PlatformInteraction;
use crate::view::ViewInstance;

/// The value a control reports when interacted with.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    /// Plain trigger with no data (a button press).
    Pressed,
    /// Free-text input.
    Text(String),
    /// One or more selected options.
    Selection(Vec<String>),
}

impl From<ControlValue> for Value {
    fn from(value: ControlValue) -> Self {
        match value {
            ControlValue::Pressed => Value::Bool(true),
            ControlValue::Text(text) => Value::String(text),
            ControlValue::Selection(options) => {
                Value::Array(options.into_iter().map(Value::String).collect())
            }
        }
    }
}

/// Capability an interactive widget exposes to the engine: a stable
/// identity and its current value.
pub trait Control: Send + Sync {
    fn control_id(&self) -> &str;

    fn value(&self) -> ControlValue;
}

/// Async handler invoked when a control is interacted with.
pub type ControlCallback =
    Arc<dyn Fn(Arc<dyn PlatformInteraction>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Boxes a plain async function as a [`ControlCallback`].
pub fn control_callback<F, Fut>(f: F) -> ControlCallback
where
    F: Fn(Arc<dyn PlatformInteraction>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |interaction| Box::pin(f(interaction)))
}

/// Wraps a control's callback so every invocation dispatches a
/// `COMPONENT_INTERACTION` action before the original handler runs.
///
/// The owning view is held weakly; if it is already gone the dispatch is
/// skipped with an error log and the original callback still runs.
pub fn stateful_callback(
    control: Arc<dyn Control>,
    view: Weak<ViewInstance>,
    store: Arc<StateStore>,
    original: Option<ControlCallback>,
) -> ControlCallback {
    Arc::new(move |interaction| {
        let control = control.clone();
        let view = view.clone();
        let store = store.clone();
        let original = original.clone();
        Box::pin(async move {
            match view.upgrade() {
                Some(view) => {
                    store
                        .dispatch(
                            ActionPayload::ComponentInteraction {
                                component_id: control.control_id().to_string(),
                                view_id: view.id().to_string(),
                                user_id: Some(interaction.user_id()),
                                value: control.value().into(),
                            },
                            Some(view.id().to_string()),
                        )
                        .await;
                }
                None => {
                    tracing::error!(
                        "Control '{}' has no live owning view, skipping state dispatch",
                        control.control_id()
                    );
                }
            }

            match original {
                Some(callback) => callback(interaction).await,
                None => Ok(()),
            }
        })
    })
}
