//! Cart persistence adapter.
//!
//! [`CartStorage`] scopes a [`KeyValueStore`] to the single key owned by the
//! cart and orders writes with a sequence token:
//!
//! ```text
//! reducer ── write(seq=3) ──┐
//!                          ├─► Mutex<last_applied> ─► KeyValueStore
//! reducer ── write(seq=2) ──┘        (2 ≤ 3 → Superseded)
//! ```
//!
//! Writes and clears are serialised through an async mutex holding the last
//! applied token. One whose token is not newer is dropped, so a stale
//! snapshot never lands after a fresher one.

use pharmacart_core::storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a sequenced write or clear
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// The backend was updated
    Applied,
    /// A newer write had already been applied; this one was dropped
    Superseded,
}

enum Operation {
    Write(String),
    Clear,
}

/// Durable store adapter bound to the cart's storage key
///
/// Cheap to clone; clones share the backend and the sequence token.
#[derive(Clone)]
pub struct CartStorage {
    backend: Arc<dyn KeyValueStore>,
    key: Arc<str>,
    last_applied: Arc<Mutex<u64>>,
}

impl CartStorage {
    /// Bind `backend` to `key`
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self {
            backend,
            key: Arc::from(key),
            last_applied: Arc::new(Mutex::new(0)),
        }
    }

    /// The storage key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored blob
    ///
    /// Backend failures are logged and reported as `None`.
    pub async fn read(&self) -> Option<String> {
        match self.backend.get(&self.key).await {
            Ok(blob) => blob,
            Err(error) => {
                tracing::warn!(key = %self.key, %error, "Cart read failed, starting without a saved cart");
                metrics::counter!("cart.hydrate.read_failed").increment(1);
                None
            }
        }
    }

    /// Store `blob` if `sequence` is newer than the last applied write
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails. The token is not
    /// advanced, so an older pending write may still land afterwards.
    pub async fn write(&self, sequence: u64, blob: String) -> Result<WriteOutcome, StorageError> {
        self.apply(sequence, Operation::Write(blob)).await
    }

    /// Remove the stored blob if `sequence` is newer than the last applied write
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails.
    pub async fn clear(&self, sequence: u64) -> Result<WriteOutcome, StorageError> {
        self.apply(sequence, Operation::Clear).await
    }

    /// Token of the last applied write or clear (0 before any)
    pub async fn last_applied(&self) -> u64 {
        *self.last_applied.lock().await
    }

    async fn apply(&self, sequence: u64, operation: Operation) -> Result<WriteOutcome, StorageError> {
        let mut last_applied = self.last_applied.lock().await;

        if sequence <= *last_applied {
            tracing::debug!(
                key = %self.key,
                sequence,
                last_applied = *last_applied,
                "Dropping stale cart write"
            );
            metrics::counter!("cart.persist.superseded").increment(1);
            return Ok(WriteOutcome::Superseded);
        }

        let result = match operation {
            Operation::Write(blob) => self.backend.set(&self.key, blob).await,
            Operation::Clear => self.backend.remove(&self.key).await,
        };

        match result {
            Ok(()) => {
                *last_applied = sequence;
                metrics::counter!("cart.persist.succeeded").increment(1);
                Ok(WriteOutcome::Applied)
            }
            Err(error) => {
                metrics::counter!("cart.persist.failed").increment(1);
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for CartStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStorage")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
