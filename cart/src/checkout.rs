//! Order-placement payload.
//!
//! Builds the request body the remote order endpoint expects from a cart
//! snapshot. Sending it is the caller's job.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::store::CartStore;
use crate::types::{Cart, ItemId};

/// Why a cart cannot be turned into an order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    /// Nothing to order
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// No delivery address
    #[error("a delivery address is required")]
    MissingAddress,
}

/// One ordered line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Ordered item
    pub item_id: ItemId,
    /// Units ordered
    pub quantity: u32,
    /// Unit price captured when the item was added
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
}

/// Request body for the order endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    /// Lines in cart order
    pub lines: Vec<OrderLine>,
    /// Trimmed delivery address
    pub delivery_address: String,
    /// Cart total
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total: Decimal,
}

impl OrderDraft {
    /// Draft an order from a cart snapshot
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`]: the cart has no lines
    /// - [`CheckoutError::MissingAddress`]: the address is blank
    pub fn from_cart(cart: &Cart, delivery_address: &str) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let delivery_address = delivery_address.trim();
        if delivery_address.is_empty() {
            return Err(CheckoutError::MissingAddress);
        }

        Ok(Self {
            lines: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    item_id: item.id.clone(),
                    quantity: item.quantity,
                    price: item.unit_price,
                })
                .collect(),
            delivery_address: delivery_address.to_string(),
            total: cart.total(),
        })
    }

    /// Draft an order from the store's current cart
    ///
    /// # Errors
    ///
    /// See [`OrderDraft::from_cart`].
    pub async fn from_store(store: &CartStore, delivery_address: &str) -> Result<Self, CheckoutError> {
        Self::from_cart(&store.snapshot().await, delivery_address)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::LineItem;

    fn cart() -> Cart {
        Cart::from_items(vec![
            LineItem::new("A", "A", "Aspirin", Decimal::from(100)).with_quantity(2),
            LineItem::new("B", "B", "Bandage", Decimal::new(505, 1)),
        ])
        .unwrap()
    }

    #[test]
    fn drafts_lines_and_total() {
        let draft = OrderDraft::from_cart(&cart(), "  12 Main St  ").unwrap();

        assert_eq!(draft.lines.len(), 2);
        assert_eq!(
            draft.lines[0],
            OrderLine {
                item_id: ItemId::new("A"),
                quantity: 2,
                price: Decimal::from(100)
            }
        );
        assert_eq!(draft.delivery_address, "12 Main St");
        assert_eq!(draft.total, Decimal::new(2505, 1));
    }

    #[test]
    fn serializes_for_order_endpoint() {
        let draft = OrderDraft::from_cart(&cart(), "12 Main St").unwrap();
        let json = serde_json::to_value(&draft).unwrap();

        assert_eq!(json["lines"][0]["itemId"], "A");
        assert_eq!(json["lines"][0]["quantity"], 2);
        assert_eq!(json["lines"][1]["price"], 50.5);
        assert_eq!(json["deliveryAddress"], "12 Main St");
        assert_eq!(json["total"], 250.5);
    }

    #[test]
    fn prices_are_sent_exactly() {
        let price: Decimal = "0.1234567890123456789".parse().unwrap();
        let cart = Cart::from_items(vec![LineItem::new("A", "A", "A", price).with_quantity(2)])
            .unwrap();
        let body = serde_json::to_string(&OrderDraft::from_cart(&cart, "12 Main St").unwrap())
            .unwrap();

        assert!(body.contains(r#""price":0.1234567890123456789"#));
        assert!(body.contains(r#""total":0.2469135780246913578"#));
    }

    #[test]
    fn rejects_empty_cart_and_blank_address() {
        assert_eq!(
            OrderDraft::from_cart(&Cart::new(), "12 Main St"),
            Err(CheckoutError::EmptyCart)
        );
        assert_eq!(
            OrderDraft::from_cart(&cart(), " \t"),
            Err(CheckoutError::MissingAddress)
        );
    }
}
