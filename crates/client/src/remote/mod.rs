//! Remote cart and order service.
//!
//! # Architecture
//!
//! - [`CartService`] is the seam the cart manager depends on
//! - [`RemoteCartClient`] implements it over the REST endpoints with `reqwest`
//! - The server is the source of truth for signed-in carts: every mutation is
//!   followed by a full re-read rather than patched locally
//!
//! # Endpoints
//!
//! - `GET /cart/`, `POST /cart/` - list lines, create or increment a line
//! - `PUT /cart/{id}/`, `DELETE /cart/{id}/` - set quantity, delete a line
//! - `POST /cart/clear/` - empty the cart
//! - `POST /orders/` - create an order and get a payment redirect
//! - `GET /products/{id}/` - product snapshot for callers (not used by the manager)

mod client;
pub mod types;

pub use client::RemoteCartClient;

use std::num::NonZeroU32;

use async_trait::async_trait;
use storecart_core::{CartItemId, CartLine, CheckoutReceipt, OrderPayload, ProductId};
use thiserror::Error;

/// Errors that can occur when talking to the cart service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-2xx status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An authenticated endpoint was called with no bearer credential.
    #[error("no bearer credential for an authenticated call")]
    MissingCredential,
}

impl RemoteError {
    /// HTTP status for API errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for remote calls.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Operations the cart manager needs from the remote service.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Fetch the signed-in user's cart lines in server order.
    async fn list_lines(&self) -> Result<Vec<CartLine>>;

    /// Create a line, or increment the existing line for the same product.
    async fn create_line(&self, product_id: ProductId, quantity: NonZeroU32) -> Result<()>;

    /// Replace a line's quantity.
    async fn update_line(&self, id: CartItemId, quantity: NonZeroU32) -> Result<()>;

    /// Delete a line.
    async fn delete_line(&self, id: CartItemId) -> Result<()>;

    /// Delete every line.
    async fn clear(&self) -> Result<()>;

    /// Create an order.
    async fn create_order(&self, order: &OrderPayload) -> Result<CheckoutReceipt>;
}
