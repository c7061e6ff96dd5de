//! A map shared by many threads behind a single lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use rand::Rng;
use tracing::debug;

/// A `HashMap<u32, u64>` where every read and every write goes through one mutex.
#[derive(Debug, Default)]
pub struct GuardedMap {
    inner: Mutex<HashMap<u32, u64>>,
}

impl GuardedMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, u64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `key -> 2 * key`.
    pub fn insert_double(&self, key: u32) {
        self.lock().insert(key, u64::from(key) * 2);
    }

    /// Looks up `key`.
    pub fn get(&self, key: u32) -> Option<u64> {
        self.lock().get(&key).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> HashMap<u32, u64> {
        self.lock().clone()
    }
}

/// Launches `pairs` writers and `pairs` readers against `map`, each picking a random key below
/// `key_space`, and waits for all of them.
///
/// # Panics
///
/// Panics if `key_space` is zero.
pub fn hammer(map: &GuardedMap, pairs: usize, key_space: u32) {
    assert!(key_space > 0, "key space must not be empty");

    thread::scope(|s| {
        for _ in 0..pairs {
            s.spawn(|| {
                let key = rand::thread_rng().gen_range(0..key_space);
                map.insert_double(key);
            });
            s.spawn(|| {
                let key = rand::thread_rng().gen_range(0..key_space);
                let _ = map.get(key);
            });
        }
    });

    debug!(pairs, entries = map.len(), "hammer finished");
}
