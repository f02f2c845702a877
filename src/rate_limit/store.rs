use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::rate_limit::{RateKey, WindowCounter};

/// Storage interface for fixed-window counters.
///
/// One counter per [`RateKey`]; no operation ever spans more than one key.
pub trait WindowStore: Send + Sync + std::fmt::Debug {
    /// Count one request for `key` at `now` and return the counter after the update.
    ///
    /// Must be atomic per key: a missing or expired counter is replaced with
    /// `{count: 1, reset_at: now + window_millis}`, otherwise `count` is incremented. Two
    /// concurrent calls for one key must never return the same `count` within a window.
    fn hit(&self, key: &RateKey, now: u64, window_millis: u64) -> WindowCounter;

    /// Inspect the counter for a key without counting a request.
    fn get(&self, key: &RateKey) -> Option<WindowCounter>;

    /// Remove every counter whose window has ended at `now`. Returns how many were removed.
    fn sweep(&self, now: u64) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory counter store behind a single mutex.
///
/// Clones share the same map.
#[derive(Default, Clone, Debug)]
pub struct InMemoryWindowStore {
    data: Arc<Mutex<HashMap<RateKey, WindowCounter>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the map consistent, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashMap<RateKey, WindowCounter>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WindowStore for InMemoryWindowStore {
    fn hit(&self, key: &RateKey, now: u64, window_millis: u64) -> WindowCounter {
        let mut guard = self.lock();

        if let Some(counter) = guard.get_mut(key) {
            if counter.is_expired(now) {
                *counter = WindowCounter::open(now, window_millis);
            } else {
                // Counted even when the caller ends up denying the request.
                counter.count = counter.count.saturating_add(1);
            }
            return *counter;
        }

        let counter = WindowCounter::open(now, window_millis);
        guard.insert(key.clone(), counter);
        counter
    }

    fn get(&self, key: &RateKey) -> Option<WindowCounter> {
        self.lock().get(key).copied()
    }

    fn sweep(&self, now: u64) -> usize {
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|_, counter| !counter.is_expired(now));
        before - guard.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
