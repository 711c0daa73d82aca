//! Persistence seam for state snapshots.

use async_trait::async_trait;

use crate::error::Result;
use crate::state::model::StateData;

/// Storage backend for whole-tree state snapshots.
///
/// Saves are best-effort: the store fires them as detached tasks and logs
/// failures, so implementations should return errors rather than panic. The
/// in-memory tree stays authoritative regardless of backend health.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persists a snapshot of the full state tree.
    async fn save_state(&self, state: &StateData) -> Result<()>;

    /// Loads the last persisted snapshot, or `None` when nothing was saved.
    async fn load_state(&self) -> Result<Option<StateData>>;
}
