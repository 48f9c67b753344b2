//! Query-keyed TTL cache owned by each store.
//!
//! Entries are valid while `now - stored_at < expiry`. Expired entries are
//! ignored by `get` and dropped by `sweep`, which the background sweeper calls
//! on an interval. Stores clear the whole map after every successful mutation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < expiry
    }
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    expiry: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        self.entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.expiry))
            .map(|entry| entry.data.clone())
    }

    pub fn put(&self, key: impl Into<String>, data: V) {
        self.put_at(key, data, Instant::now());
    }

    pub fn put_at(&self, key: impl Into<String>, data: V, now: Instant) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                data,
                stored_at: now,
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, self.expiry));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Object-safe handle the sweeper holds on to.
pub trait Sweep: Send + Sync {
    fn sweep_expired(&self) -> usize;
}

impl<V: Clone + Send> Sweep for TtlCache<V> {
    fn sweep_expired(&self) -> usize {
        self.sweep()
    }
}
