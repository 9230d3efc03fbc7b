//! Per-job mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use docflow_core::types::id::JobId;

/// Serializes every read-modify-write on a single job within this process.
#[derive(Debug, Default)]
pub struct JobLocks {
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

impl JobLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: JobId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        lock.lock_owned().await
    }

    /// Drop the entry for `id` if nobody holds or waits on it.
    ///
    /// Call after the guard is dropped; a held guard keeps the entry alive.
    pub fn release(&self, id: JobId) {
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no job is tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
