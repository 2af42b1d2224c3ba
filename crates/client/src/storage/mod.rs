//! Durable profile storage.
//!
//! A small string key-value store scoped to one user profile, playing the
//! role browser `localStorage` plays for a web client. Only the
//! [`crate::cache::LocalCartCache`] and [`crate::auth::AuthSignal`] touch it,
//! each through its own key.

mod file;
mod memory;

pub use file::FileProfileStore;
pub use memory::MemoryProfileStore;

use async_trait::async_trait;
use thiserror::Error;

/// Storage keys used in the profile.
pub mod keys {
    /// JSON array of cart lines for the signed-out cart.
    pub const CART: &str = "cart";

    /// Bearer credential of the signed-in user.
    pub const TOKEN: &str = "token";
}

/// Errors raised by a profile store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded.
    #[error("storage encode error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value storage with whole-value replacement.
///
/// `set` must replace the previous value atomically: a reader sees either
/// the old or the new value, never a mix.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
