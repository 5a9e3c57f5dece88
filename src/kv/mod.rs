//! Key-Value Store Module
//!
//! Durable state for the trainer (learned records, drafts, solutions and
//! settings) lives behind the [`KvStore`] capability:
//! - In-memory backend for tests and single-process sessions
//! - Async-first API so a remote or browser-backed store can slot in
//! - Per-key atomic read-modify-write via [`KvStore::update`]
//!
//! # Example
//!
//! ```rust,no_run
//! use concept_trainer::kv::{KvStore, MemoryKvStore};
//!
//! # async fn example() -> concept_trainer::Result<()> {
//! let store = MemoryKvStore::new();
//!
//! // Basic operations
//! store.set("key", b"value".to_vec()).await?;
//! let value = store.get("key").await?;
//! assert_eq!(value, Some(b"value".to_vec()));
//!
//! store.delete("key").await?;
//! assert!(!store.exists("key").await?);
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryKvStore;

use crate::Result;
use std::future::Future;

/// Key-value store capability injected into the progress store.
///
/// Implementations must make [`update`](Self::update) atomic with respect
/// to other operations on the *same* key. Cross-key atomicity is not
/// required.
pub trait KvStore: Send + Sync {
    /// Get a value by key.
    ///
    /// Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Set a value for a key.
    ///
    /// Overwrites any existing value.
    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Delete a key.
    ///
    /// No-op if the key doesn't exist.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Remove every key.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// List keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Atomically replace the value for `key` with `f(current)`.
    ///
    /// Returning `None` from `f` deletes the key. Returns the value left
    /// in the store.
    fn update<F>(&self, key: &str, f: F) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send
    where
        F: FnOnce(Option<&[u8]>) -> Option<Vec<u8>> + Send;

    /// Get multiple keys in a batch.
    ///
    /// Returns values in the same order as keys. Missing keys return `None`.
    fn batch_get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>>> + Send {
        async move {
            let mut results = Vec::with_capacity(keys.len());
            for key in keys {
                results.push(self.get(key).await?);
            }
            Ok(results)
        }
    }

    /// Delete multiple keys in a batch.
    fn batch_delete(&self, keys: &[&str]) -> impl Future<Output = Result<()>> + Send {
        async move {
            for key in keys {
                self.delete(key).await?;
            }
            Ok(())
        }
    }
}
