use crate::key::FetchKey;
use crate::store::{CacheStoreStrategy, KeyIterator};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Reference-counted retention on top of an arbitrary store.
///
/// Each subscription retains its key. Once the last subscriber releases a key the entry lingers
/// for `cache_time` (so a quick re-attach still finds it) and is then evicted by the next sweep.
/// Entries that were never retained are evicted on the first sweep.
pub struct RetainedStore<Value> {
    store: Box<dyn CacheStoreStrategy<FetchKey, Value>>,
    subscribers: HashMap<FetchKey, usize>,
    released_at: HashMap<FetchKey, Instant>,
    cache_time: Duration,
}

impl<Value> RetainedStore<Value> {
    pub fn new(cache_time: Duration, store: Box<dyn CacheStoreStrategy<FetchKey, Value>>) -> Self {
        RetainedStore {
            store,
            subscribers: HashMap::new(),
            released_at: HashMap::new(),
            cache_time,
        }
    }

    pub fn retain(&mut self, key: &FetchKey) -> usize {
        self.released_at.remove(key);
        let count = self.subscribers.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns the number of subscribers left on the key.
    pub fn release(&mut self, key: &FetchKey, now: Instant) -> usize {
        let Some(count) = self.subscribers.get_mut(key) else {
            return 0;
        };

        *count -= 1;
        let left = *count;
        if left == 0 {
            self.subscribers.remove(key);
            self.released_at.insert(key.clone(), now);
        }
        left
    }

    pub fn is_retained(&self, key: &FetchKey) -> bool {
        self.subscribers.contains_key(key)
    }

    pub fn subscriber_count(&self, key: &FetchKey) -> usize {
        self.subscribers.get(key).copied().unwrap_or(0)
    }

    /// Removes unreferenced entries whose grace period is over. Returns how many were evicted.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<FetchKey> = self
            .store
            .get_keys()
            .filter(|key| !self.is_retained(key))
            .filter(|key| {
                self.released_at
                    .get(key)
                    .map_or(true, |released| now.duration_since(*released) >= self.cache_time)
            })
            .collect();

        for key in &expired {
            debug!(%key, "evicting unreferenced cache entry");
            self.store.delete(key);
            self.released_at.remove(key);
        }

        expired.len()
    }
}

impl<Value: Send> CacheStoreStrategy<FetchKey, Value> for RetainedStore<Value> {
    fn get(&self, key: &FetchKey) -> Option<Value> {
        self.store.get(key)
    }

    fn put(&mut self, key: &FetchKey, value: Value) {
        self.store.put(key, value);
    }

    fn delete(&mut self, key: &FetchKey) -> bool {
        self.released_at.remove(key);
        self.store.delete(key)
    }

    fn flush(&mut self) {
        self.released_at.clear();
        self.store.flush()
    }

    fn get_keys(&self) -> KeyIterator<FetchKey> {
        self.store.get_keys()
    }

    fn contains(&self, key: &FetchKey) -> bool {
        self.store.contains(key)
    }
}
