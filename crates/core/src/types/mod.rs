//! Core types for Storecart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use cart::{Cart, CartLine, LineNotFound};
pub use id::*;
pub use order::{CheckoutReceipt, OrderItem, OrderPayload, OrderSummary};
pub use price::Price;
pub use product::Product;
pub use status::OrderStatus;
