//! Per-record serialisation inside one process.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by record.
///
/// Serialises the processing path, webhooks and the sweep for the same
/// record within this process. The repository compare-and-swap remains
/// the guarantee across processes.
#[derive(Default)]
pub struct RecordLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(entity: &str, id: impl std::fmt::Display) -> String {
        format!("{}:{}", entity, id)
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
