//! Storecart Core - Shared types library.
//!
//! This crate provides the types used across all Storecart components:
//! - `client` - Cart state manager, local cache, and remote cart client
//! - `cli` - Command-line front end for a cart session
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart arithmetic - no I/O,
//! no storage access, no HTTP clients. This keeps it lightweight and allows
//! the same cart rules to be applied offline and when replaying state.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, products, cart lines, and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
