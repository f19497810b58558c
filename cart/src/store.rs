//! The cart store: one instance per running application, injected into
//! every consumer.
//!
//! [`CartStore`] wraps the generic runtime [`Store`] with the cart reducer.
//! Mutations return as soon as the in-memory cart has changed; persistence
//! runs on effect tasks in the background. Consumers observe changes through
//! [`CartStore::subscribe`].

use crate::config::{CartConfig, ConfigError, PersistenceMode};
use crate::file_store::FileKeyValueStore;
use crate::reducer::{CartEnvironment, CartReducer};
use crate::storage::CartStorage;
use crate::types::{Cart, CartAction, CartState, ItemId, Lifecycle, LineItem};
use pharmacart_core::environment::{Clock, SystemClock};
use pharmacart_core::storage::{KeyValueStore, MemoryKeyValueStore, StorageError};
use pharmacart_runtime::{Store, StoreConfig, StoreError};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Errors returned to cart callers
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// `add_item` was called with a quantity below 1
    #[error("item {id} must be added with a quantity of at least 1")]
    InvalidQuantity {
        /// Offending item
        id: ItemId,
    },

    /// `add_item` was called with a negative unit price
    #[error("item {id} has negative price {price}")]
    NegativePrice {
        /// Offending item
        id: ItemId,
        /// Price supplied
        price: Decimal,
    },

    /// `add_item` would push the cart total past what a [`Decimal`] can hold
    #[error("adding item {id} would overflow the cart total")]
    TotalOverflow {
        /// Offending item
        id: ItemId,
    },

    /// The underlying store rejected the action (shutting down, timed out)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configured storage backend could not be opened
    #[error("failed to open cart storage: {0}")]
    Storage(#[from] StorageError),

    /// The configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

type InnerStore = Store<CartState, CartAction, CartEnvironment, CartReducer>;

/// Handle to the single authoritative cart
///
/// Cloning yields another handle to the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: InnerStore,
}

impl CartStore {
    /// Start a cart with default runtime settings and begin hydrating
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store rejects the hydrate action.
    pub async fn start(environment: CartEnvironment) -> Result<Self, CartError> {
        Self::start_with_config(environment, StoreConfig::default()).await
    }

    /// Start a cart with explicit runtime settings and begin hydrating
    ///
    /// Returns once the hydrating read has been issued. Mutations sent before
    /// it completes are applied on top of the hydrated cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store rejects the hydrate action.
    pub async fn start_with_config(
        environment: CartEnvironment,
        config: StoreConfig,
    ) -> Result<Self, CartError> {
        let inner = Store::with_config(CartState::new(), CartReducer::new(), environment, config);
        inner.send(CartAction::Hydrate).await?;
        Ok(Self { inner })
    }

    /// Build the environment described by `config` and start the cart
    ///
    /// # Errors
    ///
    /// - [`CartError::Config`]: the configuration is invalid
    /// - [`CartError::Storage`]: the data directory cannot be created
    pub async fn open(config: &CartConfig) -> Result<Self, CartError> {
        config.validate()?;

        let backend: Option<Arc<dyn KeyValueStore>> = match config.persistence {
            PersistenceMode::File => {
                Some(Arc::new(FileKeyValueStore::open(&config.data_dir).await?))
            }
            PersistenceMode::Memory => Some(Arc::new(MemoryKeyValueStore::default())),
            PersistenceMode::None => None,
        };

        tracing::info!(
            persistence = ?config.persistence,
            key = %config.storage_key,
            "Opening cart"
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = backend.map(|backend| CartStorage::new(backend, config.storage_key.clone()));

        Self::start_with_config(CartEnvironment::new(storage, clock), config.store_config()).await
    }

    /// Add a line, or accumulate quantity onto an existing line with the same id
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`]: `item.quantity` is 0
    /// - [`CartError::NegativePrice`]: `item.unit_price` is negative
    /// - [`CartError::TotalOverflow`]: the resulting total would not fit
    /// - [`CartError::Store`]: the store is shutting down
    pub async fn add_item(&self, item: LineItem) -> Result<(), CartError> {
        if item.quantity < 1 {
            return Err(CartError::InvalidQuantity { id: item.id });
        }
        if item.unit_price < Decimal::ZERO {
            return Err(CartError::NegativePrice {
                id: item.id,
                price: item.unit_price,
            });
        }
        if self.inner.state(|s| s.cart.total_after_add(&item)).await.is_none() {
            return Err(CartError::TotalOverflow { id: item.id });
        }
        self.send(CartAction::AddItem { item }).await
    }

    /// Remove a line; absent ids are ignored
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn remove_item(&self, id: ItemId) -> Result<(), CartError> {
        self.send(CartAction::RemoveItem { id }).await
    }

    /// Set a line's absolute quantity; below 1 removes the line
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn set_quantity(&self, id: ItemId, quantity: i64) -> Result<(), CartError> {
        self.send(CartAction::SetQuantity { id, quantity }).await
    }

    /// Empty the cart and remove the durable copy
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the store is shutting down.
    pub async fn clear(&self) -> Result<(), CartError> {
        self.send(CartAction::Clear).await
    }

    async fn send(&self, action: CartAction) -> Result<(), CartError> {
        self.inner.send(action).await?;
        Ok(())
    }

    /// Copy of the current cart
    pub async fn snapshot(&self) -> Cart {
        self.inner.state(|s| s.cart.clone()).await
    }

    /// Copy of the full store state
    pub async fn state(&self) -> CartState {
        self.inner.state(Clone::clone).await
    }

    /// Σ `unit_price × quantity`
    pub async fn total(&self) -> Decimal {
        self.inner.state(|s| s.cart.total()).await
    }

    /// Σ quantity
    pub async fn item_count(&self) -> u64 {
        self.inner.state(|s| s.cart.item_count()).await
    }

    /// Current lifecycle
    pub async fn lifecycle(&self) -> Lifecycle {
        self.inner.state(|s| s.lifecycle).await
    }

    /// Wait for hydration to complete
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if the cart is not ready within `timeout`.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), CartError> {
        self.inner
            .wait_for_state(CartState::is_ready, timeout)
            .await?;
        Ok(())
    }

    /// Subscribe to state changes
    ///
    /// The receiver holds the latest state and is notified after every
    /// action that changed it.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.subscribe_state()
    }

    /// Subscribe to effect feedback (hydration and persistence results)
    #[must_use]
    pub fn subscribe_feedback(&self) -> broadcast::Receiver<CartAction> {
        self.inner.subscribe_actions()
    }

    /// Wait until no persistence or hydration work is outstanding
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if work is still running after `timeout`.
    pub async fn settle(&self, timeout: Duration) -> Result<(), CartError> {
        self.inner.wait_idle(timeout).await?;
        Ok(())
    }

    /// Stop accepting mutations and wait for outstanding writes
    ///
    /// Uses the configured shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Store`] if writes are still running at the timeout.
    pub async fn shutdown(&self) -> Result<(), CartError> {
        let timeout = self.inner.config().default_shutdown_timeout;
        self.inner.shutdown(timeout).await?;
        Ok(())
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("pending_effects", &self.inner.pending_effects())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pharmacart_testing::test_clock;

    fn in_memory_env() -> CartEnvironment {
        CartEnvironment::in_memory(Arc::new(test_clock()))
    }

    fn item(id: &str, quantity: u32, price: i64) -> LineItem {
        LineItem::new(id, id, id, Decimal::from(price)).with_quantity(quantity)
    }

    #[tokio::test]
    async fn rejects_precondition_violations_without_mutating() {
        let cart = CartStore::start(in_memory_env()).await.unwrap();
        cart.wait_until_ready(Duration::from_secs(1)).await.unwrap();

        let zero = cart.add_item(item("A", 0, 10)).await;
        assert!(matches!(zero, Err(CartError::InvalidQuantity { .. })));

        let negative = cart.add_item(item("A", 1, -10)).await;
        assert!(matches!(negative, Err(CartError::NegativePrice { .. })));

        assert!(cart.snapshot().await.is_empty());
        assert_eq!(cart.state().await.revision, 0);
    }

    #[tokio::test]
    async fn rejects_add_that_would_overflow_total() {
        let cart = CartStore::start(in_memory_env()).await.unwrap();
        let huge = LineItem::new("A", "A", "A", Decimal::MAX);

        let doubled = cart.add_item(huge.clone().with_quantity(2)).await;
        assert!(matches!(doubled, Err(CartError::TotalOverflow { .. })));
        assert!(cart.snapshot().await.is_empty());

        cart.add_item(huge.clone()).await.unwrap();
        let merged = cart.add_item(huge).await;
        assert!(matches!(merged, Err(CartError::TotalOverflow { .. })));

        assert_eq!(cart.item_count().await, 1);
        assert_eq!(cart.total().await, Decimal::MAX);
        assert_eq!(cart.state().await.revision, 1);
    }

    #[tokio::test]
    async fn in_memory_cart_is_ready_after_start() {
        let cart = CartStore::start(in_memory_env()).await.unwrap();
        assert_eq!(cart.lifecycle().await, Lifecycle::Ready);
    }

    #[tokio::test]
    async fn derived_reads() {
        let cart = CartStore::start(in_memory_env()).await.unwrap();
        cart.add_item(item("A", 2, 100)).await.unwrap();
        cart.add_item(item("B", 1, 50)).await.unwrap();

        assert_eq!(cart.total().await, Decimal::from(250));
        assert_eq!(cart.item_count().await, 3);
    }

    #[tokio::test]
    async fn open_with_memory_persistence() {
        let config = CartConfig {
            persistence: PersistenceMode::Memory,
            ..CartConfig::default()
        };
        let cart = CartStore::open(&config).await.unwrap();
        cart.wait_until_ready(Duration::from_secs(1)).await.unwrap();
        cart.add_item(item("A", 1, 1)).await.unwrap();
        cart.settle(Duration::from_secs(1)).await.unwrap();
        cart.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn open_rejects_invalid_config() {
        let config = CartConfig {
            storage_key: "  ".to_string(),
            persistence: PersistenceMode::None,
            ..CartConfig::default()
        };
        assert!(matches!(
            CartStore::open(&config).await,
            Err(CartError::Config(ConfigError::BlankStorageKey))
        ));
    }

    #[tokio::test]
    async fn mutations_after_shutdown_are_rejected() {
        let cart = CartStore::start(in_memory_env()).await.unwrap();
        cart.shutdown().await.unwrap();

        assert!(matches!(
            cart.clear().await,
            Err(CartError::Store(StoreError::ShutdownInProgress))
        ));
    }
}
