//! In-memory KV store implementation using `DashMap`.
//!
//! This is the default backend and the test fake: data is lost on
//! process restart.

use super::KvStore;
use crate::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory key-value store using lock-free concurrent hashmap.
///
/// Thread-safe; `DashMap` shard locks make [`KvStore::update`] atomic per
/// key without serializing unrelated keys.
///
/// # Example
///
/// ```rust
/// use concept_trainer::kv::{KvStore, MemoryKvStore};
///
/// # async fn example() -> concept_trainer::Result<()> {
/// let store = MemoryKvStore::new();
/// store.set("hello", b"world".to_vec()).await?;
/// assert_eq!(store.get("hello").await?, Some(b"world".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryKvStore {
    store: DashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    /// Create a new in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Get the number of entries in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        self.store.clear();
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn update<F>(&self, key: &str, f: F) -> Result<Option<Vec<u8>>>
    where
        F: FnOnce(Option<&[u8]>) -> Option<Vec<u8>> + Send,
    {
        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut entry) => match f(Some(entry.get().as_slice())) {
                Some(value) => {
                    entry.insert(value.clone());
                    Ok(Some(value))
                }
                None => {
                    entry.remove();
                    Ok(None)
                }
            },
            Entry::Vacant(entry) => match f(None) {
                Some(value) => {
                    entry.insert(value.clone());
                    Ok(Some(value))
                }
                None => Ok(None),
            },
        }
    }
}
