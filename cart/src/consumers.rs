//! UI-facing cart adapters.
//!
//! Consumers hold a [`CartStore`] handle and at most a transient selector;
//! the cart itself lives only in the store. Each type here maps to one UI
//! surface: the drawer/badge summary, a line row with +/- controls, and the
//! add-to-cart control on a catalog screen.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::normalize::{CatalogCandidate, NormalizeError, to_line_item};
use crate::store::{CartError, CartStore};
use crate::types::{Cart, ItemId, LineItem};

/// Format an amount with two decimal places, rounding half away from zero
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// One row of the cart drawer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineView {
    /// Line id
    pub id: ItemId,
    /// Display name, or the SKU label when the name is blank
    pub label: String,
    /// Unit price
    pub unit_price: Decimal,
    /// Quantity
    pub quantity: u32,
    /// `unit_price × quantity`
    pub line_total: Decimal,
}

impl From<&LineItem> for LineView {
    fn from(item: &LineItem) -> Self {
        let label = if item.display_name.trim().is_empty() {
            item.sku_label.clone()
        } else {
            item.display_name.clone()
        };
        Self {
            id: item.id.clone(),
            label,
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

/// Read-only view backing the drawer and the cart badge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSummary {
    /// Lines in cart order
    pub lines: Vec<LineView>,
    /// Σ quantity
    pub unit_count: u64,
    /// Σ line totals
    pub total: Decimal,
}

impl CartSummary {
    /// Summarise a cart snapshot
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            lines: cart.items().iter().map(LineView::from).collect(),
            unit_count: cart.item_count(),
            total: cart.total(),
        }
    }

    /// Summarise the store's current cart
    pub async fn load(store: &CartStore) -> Self {
        Self::from_cart(&store.snapshot().await)
    }

    /// Number of distinct lines
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total formatted for display
    #[must_use]
    pub fn formatted_total(&self) -> String {
        format_amount(self.total)
    }

    /// Badge text: empty for an empty cart, capped at "99+"
    #[must_use]
    pub fn badge(&self) -> String {
        match self.unit_count {
            0 => String::new(),
            1..=99 => self.unit_count.to_string(),
            _ => "99+".to_string(),
        }
    }
}

/// Controller for one line row in the drawer
#[derive(Debug, Clone)]
pub struct LineItemRow {
    store: CartStore,
    id: ItemId,
}

impl LineItemRow {
    /// Bind a row to the line with `id`
    #[must_use]
    pub const fn new(store: CartStore, id: ItemId) -> Self {
        Self { store, id }
    }

    /// The line this row controls
    #[must_use]
    pub const fn id(&self) -> &ItemId {
        &self.id
    }

    /// Current quantity, `None` once the line is gone
    pub async fn quantity(&self) -> Option<u32> {
        self.store
            .snapshot()
            .await
            .get(&self.id)
            .map(|item| item.quantity)
    }

    /// One more unit, as an absolute set of `current + 1`
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the store rejects the change.
    pub async fn increment(&self) -> Result<(), CartError> {
        let Some(current) = self.quantity().await else {
            return Ok(());
        };
        self.store
            .set_quantity(self.id.clone(), i64::from(current) + 1)
            .await
    }

    /// One fewer unit; reaching zero removes the line
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the store rejects the change.
    pub async fn decrement(&self) -> Result<(), CartError> {
        let Some(current) = self.quantity().await else {
            return Ok(());
        };
        self.store
            .set_quantity(self.id.clone(), i64::from(current) - 1)
            .await
    }

    /// Remove the line
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the store rejects the change.
    pub async fn remove(&self) -> Result<(), CartError> {
        self.store.remove_item(self.id.clone()).await
    }
}

/// Failure of an add-to-cart submission
#[derive(Debug, thiserror::Error)]
pub enum OrderEntryError {
    /// The catalog record is incomplete
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// The cart rejected the line
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Add-to-cart control on a catalog screen
///
/// Holds a quantity selector that never goes below 1.
#[derive(Debug, Clone)]
pub struct OrderEntry {
    store: CartStore,
    candidate: CatalogCandidate,
    quantity: u32,
}

impl OrderEntry {
    /// Control for `candidate` with the selector at 1
    #[must_use]
    pub const fn new(store: CartStore, candidate: CatalogCandidate) -> Self {
        Self {
            store,
            candidate,
            quantity: 1,
        }
    }

    /// Selected quantity
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Raise the selector by one
    pub const fn increase(&mut self) {
        self.quantity = self.quantity.saturating_add(1);
    }

    /// Lower the selector by one, stopping at 1
    pub fn decrease(&mut self) {
        self.quantity = self.quantity.saturating_sub(1).max(1);
    }

    /// Set the selector, clamped to at least 1
    pub fn select(&mut self, quantity: u32) {
        self.quantity = quantity.max(1);
    }

    /// Normalise the record and add it with the selected quantity
    ///
    /// Resets the selector to 1 and returns the line that was added.
    ///
    /// # Errors
    ///
    /// - [`OrderEntryError::Normalize`]: the record cannot become a line
    /// - [`OrderEntryError::Cart`]: the cart rejected the line
    pub async fn submit(&mut self) -> Result<LineItem, OrderEntryError> {
        let item = to_line_item(&self.candidate)?.with_quantity(self.quantity);
        self.store.add_item(item.clone()).await?;
        self.quantity = 1;
        Ok(item)
    }
}
