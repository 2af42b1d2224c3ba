//! Order payloads and checkout receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Cart, OrderId, OrderStatus, Price, ProductId};

/// One line of an order, priced at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product ordered.
    pub product: ProductId,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price taken from the cart line's product snapshot.
    pub unit_price: Price,
}

/// Body of an order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Sum of `unit_price * quantity` over all items.
    pub total_amount: Price,
    /// Always `pending` for a new order.
    pub status: OrderStatus,
    /// Items in cart order.
    pub items: Vec<OrderItem>,
}

impl OrderPayload {
    /// Snapshot a cart into an order payload.
    ///
    /// Prices come from each line's product snapshot as it stands now; they
    /// are not re-fetched from the catalog.
    #[must_use]
    pub fn from_cart(cart: &Cart) -> Self {
        let items: Vec<OrderItem> = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product: line.product.id,
                quantity: line.quantity,
                unit_price: line.product.price,
            })
            .collect();
        let total_amount = items.iter().map(|item| item.unit_price * item.quantity).sum();

        Self {
            total_amount,
            status: OrderStatus::Pending,
            items,
        }
    }
}

/// Order as echoed back by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Order ID.
    pub id: OrderId,
    /// Order total.
    pub total_amount: Price,
    /// Payment status.
    #[serde(default)]
    pub status: OrderStatus,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Ordered items.
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    /// The created order.
    pub order: OrderSummary,
    /// Where to send the shopper to pay.
    #[serde(default)]
    pub payment_url: Option<String>,
}
