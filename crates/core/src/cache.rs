//! In-memory key-value cache with per-entry TTL.
//!
//! Backs the per-client run history. Eviction is lazy: expired entries
//! are dropped when next read, never by a background sweeper. Nothing
//! here survives a process restart.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Entry lifetime used by [`TtlCache::set`] when no explicit TTL is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded-lifetime key-value store.
///
/// Thread-safe via an interior `RwLock`; share it behind an `Arc`.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a value with the default 15-minute lifetime.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, DEFAULT_TTL);
    }

    /// Insert a value with an explicit lifetime.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, Instant::now() + ttl);
    }

    /// Look up a live entry, removing it if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn insert_at(&self, key: K, value: V, expires_at: Instant) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, Entry { value, expires_at });
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and drop the entry.
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        None
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
