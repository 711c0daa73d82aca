//! Core domain layer for Weft: the action model, the state tree, the
//! dispatch store with its built-in reducers, the persistence seam, and
//! background task tracking.
//!
//! The interaction layer (`weft-interaction`) builds the session registry
//! and view lifecycle engine on top of these pieces.

pub mod action;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod tasks;

// Re-export common error type
pub use action::{Action, ActionPayload};
pub use config::WeftConfig;
pub use error::{Result, WeftError};
pub use state::{StateData, StateStore};
pub use storage::StorageBackend;
pub use tasks::TaskTracker;
