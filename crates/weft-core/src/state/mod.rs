//! State tree, dispatch store, and the built-in reducers.
//!
//! # Module Structure
//!
//! - `model`: serializable state tree (`StateData` and its namespaces)
//! - `store`: the dispatch engine (`StateStore`, reducer/subscriber types)
//! - `reducers`: built-in reducers for the core action types

pub mod model;
pub mod reducers;
pub mod store;

pub use model::{
    ComponentState, InteractionRecord, NavigationRecord, SessionState, StateData, ViewState,
};
pub use store::{DispatchOptions, ReducerFn, StateStore, SubscriberFn, reducer, subscriber};
