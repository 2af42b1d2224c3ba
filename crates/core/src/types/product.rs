//! Product snapshot carried by cart lines.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// Catalog data captured when a cart line was created.
///
/// The snapshot is not refreshed while the line lives in the cart; the one
/// exception is that a snapshot reporting zero stock cannot be added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Unit price at snapshot time.
    pub price: Price,
    /// Image URL.
    #[serde(default)]
    pub image_url: String,
    /// Remaining stock at snapshot time, when the catalog reports it.
    #[serde(default)]
    pub inventory_count: Option<u32>,
}

impl Product {
    /// Whether the snapshot reports the product as sold out.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        matches!(self.inventory_count, Some(0))
    }
}
