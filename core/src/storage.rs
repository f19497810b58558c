//! Durable key/value storage for client-side state.
//!
//! # Overview
//!
//! Features that must survive a process restart persist a single opaque
//! blob per key. The storage backend is an external capability: a file on
//! disk, a platform preferences store, or an in-memory map in tests.
//!
//! ```text
//! ┌──────────────┐  encode   ┌──────────────┐  set(key, blob)  ┌──────────────┐
//! │ Feature state│ ────────► │  String blob │ ───────────────► │ KeyValueStore│
//! └──────────────┘           └──────────────┘                  └──────────────┘
//! ```
//!
//! ## Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `impl Future` so that environments can hold `Arc<dyn KeyValueStore>` and
//! swap backends at startup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the underlying medium failed
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// The key is not usable by this backend
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable string storage addressed by key.
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(data_dir)?);
/// store.set("pharmacart.cart", r#"{"items":[]}"#.to_string()).await?;
/// let blob = store.get("pharmacart.cart").await?;
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Get the blob stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Some(blob)` if found
    /// - `None` if nothing is stored under the key
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails to read.
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

    /// Store `value` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails to write.
    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()>;

    /// Remove the blob stored under `key`.
    ///
    /// Removing a key that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails to remove.
    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;
}

/// Process-local [`KeyValueStore`]; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    fn poisoned() -> StorageError {
        StorageError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            let entries = self.entries.read().map_err(|_| Self::poisoned())?;
            Ok(entries.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
            entries.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
            entries.remove(key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_values() -> Result<()> {
        let store = MemoryKeyValueStore::default();

        assert_eq!(store.get("cart").await?, None);
        store.set("cart", "blob".to_string()).await?;
        assert_eq!(store.get("cart").await?, Some("blob".to_string()));
        store.remove("cart").await?;
        store.remove("cart").await?;
        assert_eq!(store.get("cart").await?, None);
        Ok(())
    }

    #[test]
    fn io_errors_convert_to_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let error = StorageError::from(io);
        assert!(matches!(error, StorageError::Io(ref msg) if msg.contains("read-only")));
    }

    #[test]
    fn storage_error_display() {
        let error = StorageError::Unavailable("keychain locked".to_string());
        assert_eq!(error.to_string(), "Storage unavailable: keychain locked");
    }
}
