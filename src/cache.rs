//! Bounded in-memory LRU caches and request fingerprints.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

struct Entry<V> {
    value: V,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    clock: u64,
    hits: u64,
    misses: u64,
}

/// Fixed-capacity cache evicting the least recently used entry. No TTL.
///
/// Every get/set holds one lock, so concurrent branches see consistent entries.
pub struct LruCache<K, V> {
    name: &'static str,
    inner: Mutex<Inner<K, V>>,
    max_entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, max_entries: usize) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
                hits: 0,
                misses: 0,
            }),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        inner.clock += 1;
        let now = inner.clock;
        let found = match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = now;
                Some(entry.value.clone())
            }
            None => None,
        };
        if found.is_some() {
            inner.hits += 1;
            debug!(cache = self.name, ?key, "cache hit");
        } else {
            inner.misses += 1;
            debug!(cache = self.name, ?key, "cache miss");
        }
        found
    }

    pub fn set(&self, key: K, value: V) {
        let mut inner = self.lock();
        inner.clock += 1;
        let now = inner.clock;

        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            let lru_key = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(evicted) = lru_key {
                inner.entries.remove(&evicted);
                debug!(cache = self.name, key = ?evicted, "evicted LRU entry");
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                last_used: now,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

/// Stable blake3 fingerprint of a serializable request.
///
/// Returns `None` if the value cannot be serialized; callers then fall back
/// to a degraded key instead of failing.
pub fn fingerprint<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(blake3::hash(&bytes).to_hex().to_string()),
        Err(e) => {
            warn!("Failed to build cache fingerprint: {}", e);
            None
        }
    }
}

/// Order-sensitive fingerprint of a list of strings. Empty lists hash to "".
pub fn list_fingerprint(items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(&(item.len() as u64).to_le_bytes());
        hasher.update(item.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
