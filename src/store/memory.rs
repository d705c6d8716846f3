use crate::store::{CacheStoreStrategy, KeyIterator};
use std::collections::HashMap;
use std::hash::Hash;

pub struct MemoryStore<Key, Value> {
    data: HashMap<Key, Value>,
}

impl<Key, Value> Default for MemoryStore<Key, Value> {
    fn default() -> Self {
        MemoryStore {
            data: HashMap::new(),
        }
    }
}

impl<Key, Value> MemoryStore<Key, Value> {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<Key, Value> CacheStoreStrategy<Key, Value> for MemoryStore<Key, Value>
where
    Key: Eq + Clone + Hash + Send,
    Value: Clone + Send,
{
    fn get(&self, key: &Key) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: &Key, value: Value) {
        self.data.insert(key.clone(), value);
    }

    fn delete(&mut self, key: &Key) -> bool {
        self.data.remove(key).is_some()
    }

    fn flush(&mut self) {
        self.data.clear();
    }

    fn get_keys(&self) -> KeyIterator<Key> {
        Box::new(self.data.keys().cloned())
    }

    fn contains(&self, key: &Key) -> bool {
        self.data.contains_key(key)
    }
}
