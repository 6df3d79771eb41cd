use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/* KeyLocks hands out one async mutex per key.
 * Operations on the same key run one after another, operations on distinct keys
 * run freely. Idle entries are pruned once the map grows past PRUNE_THRESHOLD.
 */

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> KeyLocks {
        KeyLocks::default()
    }

    // Waits for exclusive access to a key. Released when the guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() >= PRUNE_THRESHOLD {
            // Only the map itself holds an idle lock
            self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        let lock = self.locks.entry(key.to_string()).or_default().clone();

        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
