use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// In-process single-writer gate keyed by an arbitrary string (booking id, template id).
///
/// Writers holding the guard for the same key run one after another; different keys
/// never block each other.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(key).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                Arc::clone(locks.entry(key.to_string()).or_default())
            }
        };

        debug!("Acquiring write lock for {}", key);
        lock.lock_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub async fn prune(&self) {
        let mut locks = self.locks.write().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
