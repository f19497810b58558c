//! Catalog record normalisation.
//!
//! Catalog and search screens hand over loosely-shaped records where almost
//! every field is optional. [`to_line_item`] turns one into a [`LineItem`]
//! once, at the consumer boundary, so the cart only ever sees complete lines.
//!
//! Display name fallback order:
//!
//! 1. `name`
//! 2. `brand_name`
//! 3. `generic_name`
//! 4. `category` and `dosage`, joined by a space (either alone if the other is missing)
//! 5. the SKU label
//!
//! The SKU label itself falls back to the id. Blank strings count as absent.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{ItemId, LineItem};

/// A catalog record as returned by listing and search endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCandidate {
    /// Catalog identifier
    pub id: Option<String>,
    /// SKU or product code
    pub sku_label: Option<String>,
    /// Preferred display name
    pub name: Option<String>,
    /// Brand name
    pub brand_name: Option<String>,
    /// Generic (molecule) name
    pub generic_name: Option<String>,
    /// Category, e.g. "Tablet"
    pub category: Option<String>,
    /// Strength, e.g. "500mg"
    pub dosage: Option<String>,
    /// Unit price
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    /// Image reference
    pub image_ref: Option<String>,
}

/// A catalog record that cannot become a cart line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// No usable identifier
    #[error("catalog record has no id")]
    MissingId,

    /// No price
    #[error("catalog record {0} has no price")]
    MissingPrice(ItemId),

    /// Negative price
    #[error("catalog record {id} has negative price {price}")]
    NegativePrice {
        /// Offending record
        id: ItemId,
        /// Price found
        price: Decimal,
    },
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn category_dosage(candidate: &CatalogCandidate) -> Option<String> {
    match (
        present(candidate.category.as_ref()),
        present(candidate.dosage.as_ref()),
    ) {
        (Some(category), Some(dosage)) => Some(format!("{category} {dosage}")),
        (Some(single), None) | (None, Some(single)) => Some(single.to_string()),
        (None, None) => None,
    }
}

/// Turn a catalog record into a cart line with a quantity of 1
///
/// # Errors
///
/// - [`NormalizeError::MissingId`]: the id is absent or blank
/// - [`NormalizeError::MissingPrice`]: the price is absent
/// - [`NormalizeError::NegativePrice`]: the price is negative
pub fn to_line_item(candidate: &CatalogCandidate) -> Result<LineItem, NormalizeError> {
    let id = present(candidate.id.as_ref())
        .map(ItemId::new)
        .ok_or(NormalizeError::MissingId)?;

    let price = candidate
        .price
        .ok_or_else(|| NormalizeError::MissingPrice(id.clone()))?;
    if price < Decimal::ZERO {
        return Err(NormalizeError::NegativePrice { id, price });
    }

    let sku_label = present(candidate.sku_label.as_ref())
        .unwrap_or(id.as_str())
        .to_string();

    let display_name = present(candidate.name.as_ref())
        .or_else(|| present(candidate.brand_name.as_ref()))
        .or_else(|| present(candidate.generic_name.as_ref()))
        .map(str::to_string)
        .or_else(|| category_dosage(candidate))
        .unwrap_or_else(|| sku_label.clone());

    let mut item = LineItem::new(id, sku_label, display_name, price);
    item.image_ref = present(candidate.image_ref.as_ref()).map(str::to_string);
    Ok(item)
}
