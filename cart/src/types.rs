//! Domain types for the shopping cart.
//!
//! A cart is an ordered list of line items, unique by [`ItemId`]. Every
//! mutation goes through [`Cart`]'s crate-private methods, which keep four
//! invariants:
//!
//! - item ids are unique
//! - every quantity is at least 1 (a change that would go lower removes the item)
//! - no unit price is negative
//! - the total fits in a [`Decimal`]
//!
//! The total is always derived from the lines and never stored.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::storage::WriteOutcome;

/// Stable identifier of an orderable item (medicine or SKU)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an `ItemId` from any string-like value
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One orderable unit in the cart
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    /// Unique key within a cart
    pub id: ItemId,
    /// Fallback display code when no human name is available
    pub sku_label: String,
    /// Human-readable name
    pub display_name: String,
    /// Price per unit, fixed when the item was added
    pub unit_price: Decimal,
    /// Number of units
    pub quantity: u32,
    /// Opaque image reference
    pub image_ref: Option<String>,
}

impl LineItem {
    /// Creates a line item with a quantity of 1 and no image
    #[must_use]
    pub fn new(
        id: impl Into<ItemId>,
        sku_label: impl Into<String>,
        display_name: impl Into<String>,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            sku_label: sku_label.into(),
            display_name: display_name.into(),
            unit_price,
            quantity: 1,
            image_ref: None,
        }
    }

    /// Sets the quantity
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the image reference
    #[must_use]
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// `unit_price × quantity`, saturating at [`Decimal::MAX`]
    ///
    /// Lines held by a [`Cart`] never saturate.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }

    /// `unit_price × quantity`, or `None` on overflow
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Sums `price × quantity` pairs in order, `None` on overflow
fn checked_sum(lines: impl IntoIterator<Item = (Decimal, u32)>) -> Option<Decimal> {
    lines.into_iter().try_fold(Decimal::ZERO, |total, (price, quantity)| {
        total.checked_add(price.checked_mul(Decimal::from(quantity))?)
    })
}

/// A cart invariant broken by a set of line items
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// Two lines share an id
    #[error("duplicate item id {0}")]
    DuplicateItem(ItemId),

    /// A line has a quantity below 1
    #[error("item {id} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        /// Offending item
        id: ItemId,
        /// Quantity found
        quantity: i64,
    },

    /// A line has a negative unit price
    #[error("item {id} has negative price {price}")]
    NegativePrice {
        /// Offending item
        id: ItemId,
        /// Price found
        price: Decimal,
    },

    /// The cart total no longer fits in a [`Decimal`] once this line is counted
    #[error("cart total overflows at item {0}")]
    TotalOverflow(ItemId),
}

/// The cart aggregate
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Creates an empty cart
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Builds a cart from existing lines, keeping their order
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found in `items`.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self, InvariantViolation> {
        let cart = Self { items };
        cart.validate()?;
        Ok(cart)
    }

    /// Checks uniqueness, quantity floor, non-negative prices and that the
    /// total is representable
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::with_capacity(self.items.len());
        let mut total = Decimal::ZERO;
        for item in &self.items {
            if !seen.insert(&item.id) {
                return Err(InvariantViolation::DuplicateItem(item.id.clone()));
            }
            if item.quantity == 0 {
                return Err(InvariantViolation::NonPositiveQuantity {
                    id: item.id.clone(),
                    quantity: 0,
                });
            }
            if item.unit_price < Decimal::ZERO {
                return Err(InvariantViolation::NegativePrice {
                    id: item.id.clone(),
                    price: item.unit_price,
                });
            }
            total = item
                .checked_line_total()
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| InvariantViolation::TotalOverflow(item.id.clone()))?;
        }
        Ok(())
    }

    /// Lines in insertion order
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Looks up a line by id
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Whether a line with `id` exists
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Σ `unit_price × quantity`
    #[must_use]
    pub fn total(&self) -> Decimal {
        // Every cart is built through `validate` or the guarded mutators
        checked_sum(self.lines()).unwrap_or(Decimal::MAX)
    }

    /// The total the cart would have once `candidate` is added (merging by
    /// id), or `None` if it would overflow
    #[must_use]
    pub fn total_after_add(&self, candidate: &LineItem) -> Option<Decimal> {
        let replacement = match self.get(&candidate.id) {
            Some(existing) => (
                existing.unit_price,
                existing.quantity.saturating_add(candidate.quantity),
            ),
            None => (candidate.unit_price, candidate.quantity),
        };
        self.total_with(&candidate.id, replacement)
    }

    fn lines(&self) -> impl Iterator<Item = (Decimal, u32)> + '_ {
        self.items.iter().map(|item| (item.unit_price, item.quantity))
    }

    /// Total with the line `id` priced as `replacement`, appended when absent
    fn total_with(&self, id: &ItemId, replacement: (Decimal, u32)) -> Option<Decimal> {
        let present = self.contains(id);
        let lines = self
            .items
            .iter()
            .map(|item| {
                if &item.id == id {
                    replacement
                } else {
                    (item.unit_price, item.quantity)
                }
            })
            .chain((!present).then_some(replacement));
        checked_sum(lines)
    }

    /// Σ quantity, for badges
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Number of distinct lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge-by-id add. An existing line keeps its price and labels and only
    /// accumulates quantity. Returns whether the cart changed.
    ///
    /// A candidate with a zero quantity or a negative price, or one that would
    /// overflow the total, is refused and leaves the cart unchanged.
    pub(crate) fn add(&mut self, candidate: LineItem) -> bool {
        if candidate.quantity == 0 || candidate.unit_price < Decimal::ZERO {
            tracing::debug!(
                id = %candidate.id,
                quantity = candidate.quantity,
                price = %candidate.unit_price,
                "Refusing invalid line item"
            );
            return false;
        }
        if self.total_after_add(&candidate).is_none() {
            tracing::debug!(id = %candidate.id, "Refusing line item: total would overflow");
            return false;
        }

        if let Some(existing) = self.items.iter_mut().find(|item| item.id == candidate.id) {
            let merged = existing.quantity.saturating_add(candidate.quantity);
            let changed = merged != existing.quantity;
            existing.quantity = merged;
            changed
        } else {
            self.items.push(candidate);
            true
        }
    }

    /// Removes the line with `id`. Returns whether it was present.
    pub(crate) fn remove(&mut self, id: &ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Absolute quantity set. Below 1 removes the line; an absent id is left
    /// alone. Returns whether the cart changed.
    pub(crate) fn set_quantity(&mut self, id: &ItemId, quantity: i64) -> bool {
        if quantity < 1 {
            return self.remove(id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(price) = self.get(id).map(|item| item.unit_price) else {
            return false;
        };
        if self.total_with(id, (price, quantity)).is_none() {
            tracing::debug!(%id, quantity, "Refusing quantity change: total would overflow");
            return false;
        }
        match self.items.iter_mut().find(|item| &item.id == id) {
            Some(item) if item.quantity != quantity => {
                item.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Drops every line. Returns whether there were any.
    pub(crate) fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }
}

/// Cart-wide lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Waiting for the first storage read to complete
    #[default]
    Hydrating,
    /// Hydrated; terminal for the process lifetime
    Ready,
}

/// A cart mutation requested by a consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartCommand {
    /// Add a line, or accumulate quantity onto an existing one
    AddItem(LineItem),
    /// Remove a line if present
    RemoveItem(ItemId),
    /// Set a line's quantity; below 1 removes it
    SetQuantity {
        /// Target line
        id: ItemId,
        /// New absolute quantity
        quantity: i64,
    },
    /// Remove every line
    Clear,
}

/// State owned by the cart store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartState {
    /// Authoritative in-memory cart
    pub cart: Cart,
    /// Hydration lifecycle
    pub lifecycle: Lifecycle,
    /// Number of actual changes applied since start
    pub revision: u64,
    /// Token handed to the next persistence write
    pub next_sequence: u64,
    /// Mutations received while hydrating, replayed in order once ready
    pub deferred: Vec<CartCommand>,
    /// Time of the last actual change
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the hydrating read has been issued
    pub hydration_requested: bool,
}

impl CartState {
    /// Creates the initial state: an empty cart, still hydrating
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cart: Cart::new(),
            lifecycle: Lifecycle::Hydrating,
            revision: 0,
            next_sequence: 1,
            deferred: Vec::new(),
            updated_at: None,
            hydration_requested: false,
        }
    }

    /// Creates a state that is already ready with the given cart
    #[must_use]
    pub fn ready(cart: Cart) -> Self {
        Self {
            cart,
            lifecycle: Lifecycle::Ready,
            ..Self::new()
        }
    }

    /// Whether hydration has completed
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}

/// Actions handled by the cart reducer
///
/// Commands come from consumers; the rest are fed back by effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartAction {
    // ========== Commands ==========
    /// Command: add a line or accumulate its quantity
    AddItem {
        /// Candidate line
        item: LineItem,
    },

    /// Command: remove a line
    RemoveItem {
        /// Line to remove
        id: ItemId,
    },

    /// Command: set a line's absolute quantity
    SetQuantity {
        /// Target line
        id: ItemId,
        /// New quantity; below 1 removes the line
        quantity: i64,
    },

    /// Command: empty the cart and the durable copy
    Clear,

    /// Command: issue the hydrating read
    Hydrate,

    // ========== Feedback ==========
    /// The hydrating read completed
    Hydrated {
        /// Raw blob, `None` when nothing was stored or the read failed
        snapshot: Option<String>,
    },

    /// A persistence write or clear completed
    Persisted {
        /// Token of the write
        sequence: u64,
        /// Whether it was applied or dropped as stale
        outcome: WriteOutcome,
    },

    /// A persistence write or clear failed
    PersistFailed {
        /// Token of the write
        sequence: u64,
        /// Storage error description
        reason: String,
    },
}

impl From<CartCommand> for CartAction {
    fn from(command: CartCommand) -> Self {
        match command {
            CartCommand::AddItem(item) => Self::AddItem { item },
            CartCommand::RemoveItem(id) => Self::RemoveItem { id },
            CartCommand::SetQuantity { id, quantity } => Self::SetQuantity { id, quantity },
            CartCommand::Clear => Self::Clear,
        }
    }
}
