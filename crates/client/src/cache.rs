//! Persistent local cache of the signed-out cart.
//!
//! One profile key holds the whole cart as a JSON array of lines. There are
//! no partial updates: every write replaces the snapshot. Unreadable or
//! corrupt data is treated as an empty cart and erased, so a damaged
//! profile can never take the session down with it.

use std::sync::Arc;

use storecart_core::Cart;
use tracing::{debug, instrument, warn};

use crate::storage::{ProfileStore, StorageError, keys};

/// Read/replace/erase access to the cached cart snapshot.
#[derive(Clone)]
pub struct LocalCartCache {
    store: Arc<dyn ProfileStore>,
}

impl LocalCartCache {
    /// Create a cache over a profile store.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Read the cached cart.
    ///
    /// Missing, unreadable, and corrupt snapshots all yield an empty cart.
    /// Unreadable and corrupt snapshots are erased.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Cart {
        let raw = match self.store.get(keys::CART).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cached cart, erasing");
                self.discard().await;
                return Cart::new();
            }
        };

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => {
                debug!(lines = cart.len(), "Loaded cached cart");
                cart
            }
            Err(e) => {
                warn!(error = %e, "Cached cart is corrupt, erasing");
                self.discard().await;
                Cart::new()
            }
        }
    }

    async fn discard(&self) {
        if let Err(e) = self.store.remove(keys::CART).await {
            warn!(error = %e, "Failed to erase unusable cached cart");
        }
    }

    /// Replace the cached cart with `cart`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be encoded or written.
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn replace(&self, cart: &Cart) -> Result<(), StorageError> {
        let raw = serde_json::to_string(cart)?;
        self.store.set(keys::CART, &raw).await
    }

    /// Erase the cached cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the underlying store fails.
    #[instrument(skip(self))]
    pub async fn erase(&self) -> Result<(), StorageError> {
        self.store.remove(keys::CART).await
    }
}

impl std::fmt::Debug for LocalCartCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartCache").finish_non_exhaustive()
    }
}
