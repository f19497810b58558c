//! Shopping cart for the pharmacy-delivery ordering app.
//!
//! The cart is a reducer-driven state container: consumers send commands to
//! a single [`CartStore`], the [`CartReducer`] applies them to the in-memory
//! [`Cart`], and every actual change is persisted in the background through a
//! [`CartStorage`] adapter. It demonstrates:
//!
//! - Merge-by-id add, absolute quantity set, remove and clear
//! - Hydration from durable storage, deferring early mutations
//! - Sequenced, non-blocking persistence that never rolls back memory
//! - Consumer adapters for the drawer, line rows and catalog screens
//!
//! # Quick Start
//!
//! ```no_run
//! use pharmacart::{CartEnvironment, CartStore, LineItem};
//! use pharmacart_core::environment::SystemClock;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cart = CartStore::start(CartEnvironment::in_memory(Arc::new(SystemClock))).await?;
//! cart.wait_until_ready(Duration::from_secs(1)).await?;
//!
//! cart.add_item(LineItem::new("med-1", "PCM500", "Paracetamol 500mg", Decimal::new(1250, 2)))
//!     .await?;
//! println!("Total: {}", cart.total().await);
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod codec;
pub mod config;
pub mod consumers;
pub mod file_store;
pub mod normalize;
pub mod reducer;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use checkout::{CheckoutError, OrderDraft, OrderLine};
pub use codec::{DecodeError, decode, encode};
pub use config::{CartConfig, ConfigError, PersistenceMode};
pub use consumers::{CartSummary, LineItemRow, LineView, OrderEntry, OrderEntryError};
pub use file_store::FileKeyValueStore;
pub use normalize::{CatalogCandidate, NormalizeError, to_line_item};
pub use reducer::{CartEnvironment, CartReducer};
pub use storage::{CartStorage, WriteOutcome};
pub use store::{CartError, CartStore};
pub use types::{Cart, CartAction, CartCommand, CartState, ItemId, Lifecycle, LineItem};
