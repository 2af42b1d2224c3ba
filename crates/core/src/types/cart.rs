//! Cart lines and the ordered cart collection.
//!
//! All offline cart arithmetic lives here so the same rules apply whether a
//! cart is mutated interactively or rebuilt from a persisted snapshot.

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::types::{LineId, Price, Product, ProductId};

/// One product/quantity pairing in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Line identifier (server id, or placeholder for offline lines).
    pub id: LineId,
    /// Product snapshot taken when the line was created.
    pub product: Product,
    /// Quantity. Always at least one inside a [`Cart`].
    pub quantity: u32,
    /// Price override recorded for offline lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Price>,
}

impl CartLine {
    /// Effective unit price: the override when present, else the snapshot price.
    #[must_use]
    pub fn price(&self) -> Price {
        self.unit_price.unwrap_or(self.product.price)
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price() * self.quantity
    }
}

/// Returned when a mutation names a line the cart does not hold.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cart line not found: {0}")]
pub struct LineNotFound(pub LineId);

/// Ordered collection of cart lines, unique by line id.
///
/// Serialized as a plain JSON array of lines. Zero-quantity lines and
/// repeated ids are dropped on construction, so a snapshot read back from
/// storage always satisfies the cart invariants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from lines in order, keeping the first line for each id.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 || cart.get(&line.id).is_some() {
                continue;
            }
            cart.lines.push(line);
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up a line by id.
    #[must_use]
    pub fn get(&self, id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == *id)
    }

    /// Look up the line holding a product.
    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.id == product_id)
    }

    /// Add a product offline.
    ///
    /// Increments the existing line for the same product, or appends a new
    /// line with a placeholder id and the snapshot price recorded as its
    /// unit price. Returns the id of the affected line.
    pub fn add_product(&mut self, product: &Product, quantity: NonZeroU32) -> LineId {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product.id == product.id)
        {
            line.quantity = line.quantity.saturating_add(quantity.get());
            return line.id;
        }

        let id = LineId::placeholder();
        self.lines.push(CartLine {
            id,
            product: product.clone(),
            quantity: quantity.get(),
            unit_price: Some(product.price),
        });
        id
    }

    /// Replace the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns [`LineNotFound`] if no line has the given id.
    pub fn set_quantity(&mut self, id: &LineId, quantity: NonZeroU32) -> Result<(), LineNotFound> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id == *id)
            .ok_or(LineNotFound(*id))?;
        line.quantity = quantity.get();
        Ok(())
    }

    /// Remove a line, returning it if it was present.
    pub fn remove(&mut self, id: &LineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| line.id == *id)?;
        Some(self.lines.remove(index))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}
