//! In-memory storage testing utilities
//!
//! Provides fast, deterministic storage for tests:
//! - [`InMemoryKeyValueStore`]: HashMap-based key/value storage
//! - Failure injection for reads and writes
//! - Per-call delays to exercise overlapping writes
//! - A log of completed operations in completion order

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use pharmacart_core::storage::{KeyValueStore, StorageError, StorageFuture};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// A completed mutation recorded by [`InMemoryKeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOperation {
    /// `set(key, value)` completed
    Set {
        /// Key written
        key: String,
        /// Blob written
        value: String,
    },
    /// `remove(key)` completed
    Remove {
        /// Key removed
        key: String,
    },
}

/// In-memory key/value store for fast, deterministic testing.
///
/// Clones share the same data, so a test can keep one handle for inspection
/// while the code under test owns another.
///
/// # Example
///
/// ```
/// use pharmacart_testing::InMemoryKeyValueStore;
/// use pharmacart_core::storage::KeyValueStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryKeyValueStore::new();
///
/// store.set("pharmacart.cart", r#"{"items":[]}"#.to_string()).await?;
/// assert!(store.contains_key("pharmacart.cart"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: Arc<RwLock<HashMap<String, String>>>,
    history: Arc<RwLock<Vec<StorageOperation>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    read_delay: Arc<Mutex<Option<Duration>>>,
    write_delays: Arc<Mutex<VecDeque<Duration>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `value` under `key`
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.data.write().unwrap().insert(key.into(), value.into());
        store
    }

    /// Make every subsequent `get` fail (or succeed again)
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` and `remove` fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every subsequent `get` by `delay`
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Queue a delay for the next mutating call
    ///
    /// Delays are consumed one per `set`/`remove` call, in call order. Calls
    /// with no queued delay complete immediately.
    pub fn push_write_delay(&self, delay: Duration) {
        self.write_delays.lock().unwrap().push_back(delay);
    }

    /// Current value stored under `key`
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.data.read().unwrap().get(key).cloned()
    }

    /// Check if a key exists in the store
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Get the number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Completed mutations, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<StorageOperation> {
        self.history.read().unwrap().clone()
    }

    /// Clear all data and history (for test isolation)
    pub fn clear(&self) {
        self.data.write().unwrap().clear();
        self.history.write().unwrap().clear();
    }

    fn next_write_delay(&self) -> Option<Duration> {
        self.write_delays.lock().unwrap().pop_front()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        let delay = *self.read_delay.lock().unwrap();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("injected read failure".to_string()));
            }
            Ok(self.value(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        // Taken at call time so delays follow call order, not poll order
        let delay = self.next_write_delay();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.check_writable()?;
            self.data
                .write()
                .unwrap()
                .insert(key.to_string(), value.clone());
            self.history.write().unwrap().push(StorageOperation::Set {
                key: key.to_string(),
                value,
            });
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        let delay = self.next_write_delay();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.check_writable()?;
            self.data.write().unwrap().remove(key);
            self.history.write().unwrap().push(StorageOperation::Remove {
                key: key.to_string(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() -> Result<(), StorageError> {
        let store = InMemoryKeyValueStore::new();

        assert_eq!(store.get("cart").await?, None);

        store.set("cart", "blob".to_string()).await?;
        assert_eq!(store.get("cart").await?, Some("blob".to_string()));
        assert_eq!(store.len(), 1);

        store.remove("cart").await?;
        assert!(store.is_empty());

        // Removing an absent key succeeds
        store.remove("cart").await?;
        assert_eq!(
            store.history(),
            vec![
                StorageOperation::Set {
                    key: "cart".to_string(),
                    value: "blob".to_string()
                },
                StorageOperation::Remove {
                    key: "cart".to_string()
                },
                StorageOperation::Remove {
                    key: "cart".to_string()
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn clones_share_data() -> Result<(), StorageError> {
        let store = InMemoryKeyValueStore::with_entry("cart", "seed");
        let handle = store.clone();

        assert_eq!(handle.get("cart").await?, Some("seed".to_string()));
        handle.set("cart", "next".to_string()).await?;
        assert_eq!(store.value("cart"), Some("next".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = InMemoryKeyValueStore::with_entry("cart", "seed");

        store.fail_reads(true);
        assert!(store.get("cart").await.is_err());

        store.fail_writes(true);
        assert!(store.set("cart", "x".to_string()).await.is_err());
        assert!(store.remove("cart").await.is_err());
        assert_eq!(store.value("cart"), Some("seed".to_string()));
        assert!(store.history().is_empty());

        store.fail_reads(false);
        store.fail_writes(false);
        assert!(store.set("cart", "x".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn write_delays_follow_call_order() -> Result<(), StorageError> {
        let store = InMemoryKeyValueStore::new();
        store.push_write_delay(Duration::from_millis(50));

        let slow = store.set("cart", "first".to_string());
        let fast = store.set("cart", "second".to_string());
        let (slow, fast) = tokio::join!(slow, fast);
        slow?;
        fast?;

        // The delayed first call lands last
        assert_eq!(store.value("cart"), Some("first".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn clear_resets_data_and_history() -> Result<(), StorageError> {
        let store = InMemoryKeyValueStore::new();
        store.set("a", "1".to_string()).await?;
        store.clear();
        assert!(store.is_empty());
        assert!(store.history().is_empty());
        Ok(())
    }
}
