//! State tree model.
//!
//! This is the serializable snapshot side of the system: view *metadata*
//! keyed by id, distinct from the runtime registry of live view instances.
//! Reducers treat the tree as immutable and return a full replacement.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single navigation event recorded on a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRecord {
    /// Id of the view the navigation originated from.
    pub from_view: String,
    /// Kind of the destination view.
    pub to_view_type: String,
    pub timestamp: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Serializable session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
    /// Ids of the views attached to this session. Every id listed here must
    /// exist in [`StateData::views`] until destroyed.
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub history: Vec<NavigationRecord>,
    /// Session-scoped application data, shallow-merged on update.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Serializable view metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub id: String,
    pub view_type: String,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// One recorded interaction with a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default)]
    pub user_id: Option<u64>,
    pub view_id: String,
    pub value: Value,
    pub timestamp: String,
}

/// Per-control interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub id: String,
    #[serde(default)]
    pub interactions: Vec<InteractionRecord>,
    #[serde(default)]
    pub last_interaction: Option<String>,
}

/// The full state tree: four top-level namespaces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateData {
    #[serde(default)]
    pub sessions: HashMap<String, SessionState>,
    #[serde(default)]
    pub views: HashMap<String, ViewState>,
    #[serde(default)]
    pub components: HashMap<String, ComponentState>,
    /// Free-form namespace owned by host-application reducers.
    #[serde(default)]
    pub application: Map<String, Value>,
}
