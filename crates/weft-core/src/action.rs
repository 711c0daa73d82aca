//! Action model for the dispatch store.
//!
//! Actions are immutable records describing an intended state change. Each
//! core action type carries a structured payload variant, so reducers can
//! pattern-match exhaustively instead of probing an untyped map. Host
//! applications dispatch their own action types through
//! [`ActionPayload::Custom`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured payload, one variant per core action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPayload {
    /// A view instance was registered.
    ViewCreated {
        view_id: String,
        view_type: String,
        #[serde(default)]
        user_id: Option<u64>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        props: Map<String, Value>,
    },
    /// A view's message binding or props changed.
    ViewUpdated {
        view_id: String,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        channel_id: Option<String>,
        #[serde(default)]
        props: Map<String, Value>,
    },
    /// A view instance was torn down.
    ViewDestroyed { view_id: String },
    /// A session record should exist for this id.
    SessionCreated {
        session_id: String,
        #[serde(default)]
        user_id: Option<u64>,
        #[serde(default)]
        data: Map<String, Value>,
    },
    /// Session-scoped application data changed.
    SessionUpdated {
        session_id: String,
        #[serde(default)]
        data: Map<String, Value>,
    },
    /// A view navigated to another view type.
    Navigation {
        destination: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    /// A user interacted with an interactive control.
    ComponentInteraction {
        component_id: String,
        view_id: String,
        #[serde(default)]
        user_id: Option<u64>,
        value: Value,
    },
    /// Host-application action, reduced only by custom reducers.
    Custom {
        action_type: String,
        #[serde(default)]
        data: Value,
    },
}

impl ActionPayload {
    /// The action type string used for reducer lookup.
    pub fn action_type(&self) -> &str {
        match self {
            Self::ViewCreated { .. } => "VIEW_CREATED",
            Self::ViewUpdated { .. } => "VIEW_UPDATED",
            Self::ViewDestroyed { .. } => "VIEW_DESTROYED",
            Self::SessionCreated { .. } => "SESSION_CREATED",
            Self::SessionUpdated { .. } => "SESSION_UPDATED",
            Self::Navigation { .. } => "NAVIGATION",
            Self::ComponentInteraction { .. } => "COMPONENT_INTERACTION",
            Self::Custom { action_type, .. } => action_type,
        }
    }

    /// Shorthand for a custom action without data.
    pub fn custom(action_type: impl Into<String>) -> Self {
        Self::Custom {
            action_type: action_type.into(),
            data: Value::Null,
        }
    }
}

/// A dispatched action: payload plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub payload: ActionPayload,
    /// Id of the subscriber (typically a view) that dispatched this action.
    #[serde(default)]
    pub source: Option<String>,
    /// UTC timestamp in RFC 3339 format, assigned at dispatch time.
    pub timestamp: String,
}

impl Action {
    pub fn new(payload: ActionPayload, source: Option<String>) -> Self {
        Self {
            payload,
            source,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn action_type(&self) -> &str {
        self.payload.action_type()
    }
}
