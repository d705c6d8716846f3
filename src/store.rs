pub mod memory;
pub mod retention;

use crate::key::FetchKey;
use crate::source_of_record::FetchResult;
use tokio::time::Instant;

pub type KeyIterator<'a, Key> = Box<dyn Iterator<Item = Key> + 'a>;

/// Where cache entries live. Implementations own their values; reads hand out clones so callers
/// never hold a borrow into shared state.
pub trait CacheStoreStrategy<Key, Value>: Send {
    fn get(&self, key: &Key) -> Option<Value>;

    fn put(&mut self, key: &Key, value: Value);

    /// Returns whether a value was present.
    fn delete(&mut self, key: &Key) -> bool;

    fn flush(&mut self);

    fn get_keys(&self) -> KeyIterator<Key>;

    fn contains(&self, key: &Key) -> bool;
}

/// Everything known about one key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: FetchKey,
    /// Outcome of the latest completed attempt; on success it holds that attempt's valid records.
    pub result: FetchResult<Vec<T>>,
    /// Records currently accepted for the key, after validation and merging. Survives failed
    /// attempts so they can be served stale.
    pub accepted: Vec<T>,
    /// End of the freshness window of `accepted`. `None` until a fetch succeeds.
    pub expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    pub fn pending(key: FetchKey) -> Self {
        CacheEntry {
            key,
            result: FetchResult::Pending,
            accepted: Vec::new(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now > expires_at)
    }

    pub fn has_usable_data(&self, now: Instant) -> bool {
        !self.accepted.is_empty() && !self.is_expired(now)
    }
}
