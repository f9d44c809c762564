//! Bounded least-recently-used cache.
//!
//! Eviction is a linear scan for the oldest access tick. Capacities here
//! are a few thousand entries, where the scan is cheaper than maintaining
//! an intrusive list.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    last_access: u64,
}

#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, CacheEntry<V>>,
    access_counter: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            access_counter: 0,
        }
    }

    /// Look up a key, refreshing its recency.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.access_counter += 1;
        let tick = self.access_counter;
        self.entries.get_mut(key).map(|entry| {
            entry.last_access = tick;
            &entry.value
        })
    }

    /// Like [`get`](Self::get), returning an owned value.
    pub fn get_cloned(&mut self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }

    /// Insert or refresh a key, evicting the least recently used entry
    /// when at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.access_counter += 1;
        let tick = self.access_counter;

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = value;
            entry.last_access = tick;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_access: tick,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
