//! Core reducers for the seven built-in action types.
//!
//! Every reducer is a total function: it never fails on missing ids, and a
//! no-op returns the input `Arc` unchanged, so callers can detect "nothing
//! happened" by pointer identity.

use std::sync::Arc;

use crate::action::{Action, ActionPayload};
use crate::state::model::{
    ComponentState, InteractionRecord, NavigationRecord, SessionState, StateData, ViewState,
};

/// Applies the built-in reducer matching the action's payload variant.
///
/// `Custom` payloads have no core reducer; the input state is returned
/// unchanged (the store logs this at debug level before calling).
pub async fn reduce_core(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    match &action.payload {
        ActionPayload::ViewCreated { .. } => reduce_view_created(action, state).await,
        ActionPayload::ViewUpdated { .. } => reduce_view_updated(action, state).await,
        ActionPayload::ViewDestroyed { .. } => reduce_view_destroyed(action, state).await,
        ActionPayload::SessionCreated { .. } => reduce_session_created(action, state).await,
        ActionPayload::SessionUpdated { .. } => reduce_session_updated(action, state).await,
        ActionPayload::Navigation { .. } => reduce_navigation(action, state).await,
        ActionPayload::ComponentInteraction { .. } => {
            reduce_component_interaction(action, state).await
        }
        ActionPayload::Custom { .. } => state,
    }
}

/// Inserts a view record and links it to its session.
pub async fn reduce_view_created(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::ViewCreated {
        view_id,
        view_type,
        user_id,
        session_id,
        props,
    } = &action.payload
    else {
        return state;
    };

    if view_id.is_empty() {
        return state;
    }

    let mut new_state = (*state).clone();
    new_state.views.insert(
        view_id.clone(),
        ViewState {
            id: view_id.clone(),
            view_type: view_type.clone(),
            user_id: *user_id,
            session_id: session_id.clone(),
            created_at: action.timestamp.clone(),
            updated_at: action.timestamp.clone(),
            props: props.clone(),
            message_id: None,
            channel_id: None,
        },
    );

    // Link to the session, idempotently, only if it already exists.
    if let Some(session_id) = session_id
        && let Some(session) = new_state.sessions.get_mut(session_id)
        && !session.views.contains(view_id)
    {
        session.views.push(view_id.clone());
    }

    Arc::new(new_state)
}

/// Merges message binding and props into an existing view record.
pub async fn reduce_view_updated(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::ViewUpdated {
        view_id,
        message_id,
        channel_id,
        props,
    } = &action.payload
    else {
        return state;
    };

    if !state.views.contains_key(view_id) {
        return state;
    }

    let mut new_state = (*state).clone();
    let view = new_state
        .views
        .get_mut(view_id)
        .expect("presence checked above");
    view.updated_at = action.timestamp.clone();
    if message_id.is_some() {
        view.message_id = message_id.clone();
    }
    if channel_id.is_some() {
        view.channel_id = channel_id.clone();
    }
    for (key, value) in props {
        view.props.insert(key.clone(), value.clone());
    }

    Arc::new(new_state)
}

/// Deletes a view record and unlinks it from its session.
pub async fn reduce_view_destroyed(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::ViewDestroyed { view_id } = &action.payload else {
        return state;
    };

    if !state.views.contains_key(view_id) {
        return state;
    }

    let mut new_state = (*state).clone();
    let removed = new_state
        .views
        .remove(view_id)
        .expect("presence checked above");

    if let Some(session_id) = &removed.session_id
        && let Some(session) = new_state.sessions.get_mut(session_id)
    {
        session.views.retain(|id| id != view_id);
    }

    Arc::new(new_state)
}

/// Creates a session record; idempotent when the id already exists.
pub async fn reduce_session_created(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::SessionCreated {
        session_id,
        user_id,
        data,
    } = &action.payload
    else {
        return state;
    };

    if session_id.is_empty() || state.sessions.contains_key(session_id) {
        return state;
    }

    let mut new_state = (*state).clone();
    new_state.sessions.insert(
        session_id.clone(),
        SessionState {
            id: session_id.clone(),
            user_id: *user_id,
            created_at: action.timestamp.clone(),
            updated_at: action.timestamp.clone(),
            views: Vec::new(),
            history: Vec::new(),
            data: data.clone(),
        },
    );

    Arc::new(new_state)
}

/// Shallow-merges `data` into an existing session record.
pub async fn reduce_session_updated(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::SessionUpdated { session_id, data } = &action.payload else {
        return state;
    };

    if !state.sessions.contains_key(session_id) {
        return state;
    }

    let mut new_state = (*state).clone();
    let session = new_state
        .sessions
        .get_mut(session_id)
        .expect("presence checked above");
    session.updated_at = action.timestamp.clone();
    for (key, value) in data {
        session.data.insert(key.clone(), value.clone());
    }

    Arc::new(new_state)
}

/// Records a navigation entry on the source view's session.
pub async fn reduce_navigation(action: &Action, state: Arc<StateData>) -> Arc<StateData> {
    let ActionPayload::Navigation {
        destination,
        params,
    } = &action.payload
    else {
        return state;
    };

    let Some(source_id) = &action.source else {
        return state;
    };
    let Some(source_view) = state.views.get(source_id) else {
        return state;
    };
    let Some(session_id) = source_view.session_id.clone() else {
        return state;
    };
    if !state.sessions.contains_key(&session_id) {
        return state;
    }

    let mut new_state = (*state).clone();
    let session = new_state
        .sessions
        .get_mut(&session_id)
        .expect("presence checked above");
    session.history.push(NavigationRecord {
        from_view: source_id.clone(),
        to_view_type: destination.clone(),
        timestamp: action.timestamp.clone(),
        params: params.clone(),
    });

    Arc::new(new_state)
}

/// Appends an interaction record to a control's log, creating it if absent.
pub async fn reduce_component_interaction(
    action: &Action,
    state: Arc<StateData>,
) -> Arc<StateData> {
    let ActionPayload::ComponentInteraction {
        component_id,
        view_id,
        user_id,
        value,
    } = &action.payload
    else {
        return state;
    };

    if component_id.is_empty() || view_id.is_empty() {
        return state;
    }

    let mut new_state = (*state).clone();
    let component = new_state
        .components
        .entry(component_id.clone())
        .or_insert_with(|| ComponentState {
            id: component_id.clone(),
            interactions: Vec::new(),
            last_interaction: None,
        });
    component.interactions.push(InteractionRecord {
        user_id: *user_id,
        view_id: view_id.clone(),
        value: value.clone(),
        timestamp: action.timestamp.clone(),
    });
    component.last_interaction = Some(action.timestamp.clone());

    Arc::new(new_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn dispatch_payload(payload: ActionPayload) -> Action {
        Action::new(payload, None)
    }

    async fn apply(action: Action, state: Arc<StateData>) -> Arc<StateData> {
        reduce_core(&action, state).await
    }

    #[tokio::test]
    async fn test_session_then_view_links_both_directions() {
        let state = Arc::new(StateData::default());
        let state = apply(
            dispatch_payload(ActionPayload::SessionCreated {
                session_id: "s1".into(),
                user_id: Some(42),
                data: Map::new(),
            }),
            state,
        )
        .await;
        let state = apply(
            dispatch_payload(ActionPayload::ViewCreated {
                view_id: "v1".into(),
                view_type: "X".into(),
                user_id: Some(42),
                session_id: Some("s1".into()),
                props: Map::new(),
            }),
            state,
        )
        .await;

        assert_eq!(state.sessions["s1"].views, vec!["v1".to_string()]);
        assert_eq!(state.views["v1"].view_type, "X");
    }

    #[tokio::test]
    async fn test_update_missing_view_is_pointer_identical_noop() {
        let state = Arc::new(StateData::default());
        let next = apply(
            dispatch_payload(ActionPayload::ViewUpdated {
                view_id: "ghost".into(),
                message_id: Some("m1".into()),
                channel_id: None,
                props: Map::new(),
            }),
            state.clone(),
        )
        .await;
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[tokio::test]
    async fn test_destroy_missing_view_is_noop() {
        let state = Arc::new(StateData::default());
        let next = apply(
            dispatch_payload(ActionPayload::ViewDestroyed {
                view_id: "ghost".into(),
            }),
            state.clone(),
        )
        .await;
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[tokio::test]
    async fn test_session_update_missing_is_noop() {
        let state = Arc::new(StateData::default());
        let next = apply(
            dispatch_payload(ActionPayload::SessionUpdated {
                session_id: "ghost".into(),
                data: Map::new(),
            }),
            state.clone(),
        )
        .await;
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[tokio::test]
    async fn test_session_created_is_idempotent() {
        let mut data = Map::new();
        data.insert("theme".into(), Value::String("dark".into()));
        let state = Arc::new(StateData::default());
        let state = apply(
            dispatch_payload(ActionPayload::SessionCreated {
                session_id: "s1".into(),
                user_id: Some(1),
                data,
            }),
            state,
        )
        .await;
        let again = apply(
            dispatch_payload(ActionPayload::SessionCreated {
                session_id: "s1".into(),
                user_id: Some(2),
                data: Map::new(),
            }),
            state.clone(),
        )
        .await;
        assert!(Arc::ptr_eq(&state, &again));
        assert_eq!(again.sessions["s1"].user_id, Some(1));
    }

    #[tokio::test]
    async fn test_view_destroyed_removes_both_directions() {
        let state = Arc::new(StateData::default());
        let state = apply(
            dispatch_payload(ActionPayload::SessionCreated {
                session_id: "s1".into(),
                user_id: None,
                data: Map::new(),
            }),
            state,
        )
        .await;
        let state = apply(
            dispatch_payload(ActionPayload::ViewCreated {
                view_id: "v1".into(),
                view_type: "X".into(),
                user_id: None,
                session_id: Some("s1".into()),
                props: Map::new(),
            }),
            state,
        )
        .await;
        let state = apply(
            dispatch_payload(ActionPayload::ViewDestroyed {
                view_id: "v1".into(),
            }),
            state,
        )
        .await;

        assert!(!state.views.contains_key("v1"));
        assert!(state.sessions["s1"].views.is_empty());
    }

    #[tokio::test]
    async fn test_component_interactions_append_in_order() {
        let mut state = Arc::new(StateData::default());
        for value in [Value::Bool(true), Value::Bool(false)] {
            state = apply(
                dispatch_payload(ActionPayload::ComponentInteraction {
                    component_id: "c1".into(),
                    view_id: "v1".into(),
                    user_id: Some(42),
                    value,
                }),
                state,
            )
            .await;
        }

        let component = &state.components["c1"];
        assert_eq!(component.interactions.len(), 2);
        assert_eq!(component.interactions[0].value, Value::Bool(true));
        assert_eq!(component.interactions[1].value, Value::Bool(false));
        assert!(component.last_interaction.is_some());
    }

    #[tokio::test]
    async fn test_navigation_without_source_is_noop() {
        let state = Arc::new(StateData::default());
        let next = apply(
            dispatch_payload(ActionPayload::Navigation {
                destination: "SettingsView".into(),
                params: Map::new(),
            }),
            state.clone(),
        )
        .await;
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[tokio::test]
    async fn test_navigation_records_on_source_session() {
        let state = Arc::new(StateData::default());
        let state = apply(
            dispatch_payload(ActionPayload::SessionCreated {
                session_id: "s1".into(),
                user_id: Some(42),
                data: Map::new(),
            }),
            state,
        )
        .await;
        let state = apply(
            dispatch_payload(ActionPayload::ViewCreated {
                view_id: "v1".into(),
                view_type: "MenuView".into(),
                user_id: Some(42),
                session_id: Some("s1".into()),
                props: Map::new(),
            }),
            state,
        )
        .await;
        let action = Action::new(
            ActionPayload::Navigation {
                destination: "SettingsView".into(),
                params: Map::new(),
            },
            Some("v1".into()),
        );
        let state = apply(action, state).await;

        let history = &state.sessions["s1"].history;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_view, "v1");
        assert_eq!(history[0].to_view_type, "SettingsView");
    }
}
