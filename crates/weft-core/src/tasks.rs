//! Owner-keyed background task tracking.
//!
//! Detached maintenance work (cleanup sweeps, persistence saves, adopted
//! interaction handling) is spawned through a tracker so that all tasks for
//! a given owner can be bulk-aborted when that owner goes away.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// Registry of in-flight background tasks, keyed by an owner id.
#[derive(Default)]
pub struct TaskTracker {
    tasks: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` as a detached task tracked under `owner_id`.
    ///
    /// Completed handles for the owner are pruned on each spawn so the
    /// registry does not grow unbounded.
    pub fn spawn<F>(&self, owner_id: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self.tasks.lock().expect("task registry poisoned");
        let entry = tasks.entry(owner_id.to_string()).or_default();
        entry.retain(|h| !h.is_finished());
        entry.push(handle);
    }

    /// Aborts all tracked tasks for `owner_id`, returning how many were
    /// still running.
    pub fn cancel(&self, owner_id: &str) -> usize {
        let mut tasks = self.tasks.lock().expect("task registry poisoned");
        let Some(handles) = tasks.remove(owner_id) else {
            return 0;
        };
        let mut count = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                count += 1;
            }
        }
        count
    }

    /// Aborts every tracked task. Used at shutdown.
    pub fn cancel_all(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("task registry poisoned");
        let mut count = 0;
        for (_, handles) in tasks.drain() {
            for handle in handles {
                if !handle.is_finished() {
                    handle.abort();
                    count += 1;
                }
            }
        }
        count
    }

    /// Number of tracked (possibly finished) tasks for `owner_id`.
    pub fn count(&self, owner_id: &str) -> usize {
        let tasks = self.tasks.lock().expect("task registry poisoned");
        tasks.get(owner_id).map(Vec::len).unwrap_or(0)
    }
}
