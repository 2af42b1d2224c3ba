//! Storecart client library.
//!
//! Keeps a shopper's cart consistent across offline and signed-in use:
//!
//! - [`cache`] - the signed-out cart, persisted in the user's profile
//! - [`remote`] - the REST cart and order service
//! - [`manager`] - one cart per session, routing each mutation to the cache
//!   or the server and draining the offline cart on sign-in
//! - [`auth`] - the authenticated/unauthenticated signal the manager follows
//! - [`session`] - wires the above together for one profile

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod remote;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use auth::{AuthSignal, AuthState};
pub use config::{CartOptions, ClientConfig, MutationPolicy, SyncPolicy};
pub use error::{CartError, ErrorKind};
pub use manager::{CartManager, CartState, SyncEvent, SyncReport};
pub use session::CartSession;
