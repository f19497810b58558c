//! JSON serializer for the persisted cart.
//!
//! The durable blob has one shape, with no version field:
//!
//! ```text
//! { "items": [ { "id": "...", "skuLabel": "...", "displayName": "...",
//!                "unitPrice": 12.50, "quantity": 2, "imageRef": "..." } ] }
//! ```
//!
//! `imageRef` is omitted when absent. `unitPrice` is a JSON number written
//! digit for digit from the [`Decimal`], so no precision is lost. Decoding re-checks every cart
//! invariant, so a blob written by an older or foreign build either yields a
//! valid [`Cart`] or a [`DecodeError`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Cart, InvariantViolation, ItemId, LineItem};

/// Why a stored blob could not be turned back into a cart
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON, or not the expected shape
    #[error("malformed cart blob: {0}")]
    Malformed(String),

    /// Two lines share an id
    #[error("duplicate item id {0} in cart blob")]
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

    /// The lines add up to more than a [`Decimal`] can hold
    #[error("cart total overflows at item {0}")]
    TotalOverflow(ItemId),
}

impl From<InvariantViolation> for DecodeError {
    fn from(violation: InvariantViolation) -> Self {
        match violation {
            InvariantViolation::DuplicateItem(id) => Self::DuplicateItem(id),
            InvariantViolation::NonPositiveQuantity { id, quantity } => {
                Self::NonPositiveQuantity { id, quantity }
            }
            InvariantViolation::NegativePrice { id, price } => Self::NegativePrice { id, price },
            InvariantViolation::TotalOverflow(id) => Self::TotalOverflow(id),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireCart {
    items: Vec<WireItem>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    id: String,
    sku_label: String,
    display_name: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    unit_price: Decimal,
    // Signed so that zero and negative quantities decode far enough to be reported
    quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_ref: Option<String>,
}

impl From<&LineItem> for WireItem {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id.as_str().to_string(),
            sku_label: item.sku_label.clone(),
            display_name: item.display_name.clone(),
            unit_price: item.unit_price,
            quantity: i64::from(item.quantity),
            image_ref: item.image_ref.clone(),
        }
    }
}

impl TryFrom<WireItem> for LineItem {
    type Error = DecodeError;

    fn try_from(wire: WireItem) -> Result<Self, Self::Error> {
        let id = ItemId::new(wire.id);

        if wire.quantity < 1 {
            return Err(DecodeError::NonPositiveQuantity {
                id,
                quantity: wire.quantity,
            });
        }
        let quantity = u32::try_from(wire.quantity).map_err(|_| {
            DecodeError::Malformed(format!("item {id} quantity {} out of range", wire.quantity))
        })?;

        if wire.unit_price < Decimal::ZERO {
            return Err(DecodeError::NegativePrice {
                id,
                price: wire.unit_price,
            });
        }

        Ok(Self {
            id,
            sku_label: wire.sku_label,
            display_name: wire.display_name,
            unit_price: wire.unit_price,
            quantity,
            image_ref: wire.image_ref,
        })
    }
}

/// Encode a cart as its durable JSON blob
#[must_use]
#[allow(clippy::expect_used)] // Strings, integers and decimal numbers always serialize
pub fn encode(cart: &Cart) -> String {
    let wire = WireCart {
        items: cart.items().iter().map(WireItem::from).collect(),
    };
    serde_json::to_string(&wire).expect("cart wire format always serializes")
}

/// Decode a durable JSON blob back into a cart
///
/// # Errors
///
/// - [`DecodeError::Malformed`]: not JSON or not the cart shape
/// - [`DecodeError::DuplicateItem`], [`DecodeError::NonPositiveQuantity`],
///   [`DecodeError::NegativePrice`], [`DecodeError::TotalOverflow`]: the
///   lines break a cart invariant
pub fn decode(blob: &str) -> Result<Cart, DecodeError> {
    let wire: WireCart =
        serde_json::from_str(blob).map_err(|error| DecodeError::Malformed(error.to_string()))?;

    let items = wire
        .items
        .into_iter()
        .map(LineItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart::from_items(items)?)
}
