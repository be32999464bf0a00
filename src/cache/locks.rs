//! Per-key locks for single-flight generation.
//!
//! Each key in flight maps to its own mutex. The map entry is dropped once
//! the last holder releases it, so the map only holds keys that are being
//! generated right now.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct KeyLocks {
    map: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        // A panic in another holder leaves the map consistent.
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.map().entry(key.to_string()).or_default());

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut map = self.map();
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            map.remove(key);
        }
        result
    }

    /// Number of keys currently locked or waited on.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.map().len()
    }
}
