//! Cart operation errors.
//!
//! Every public cart operation returns `Result<T, CartError>`. The
//! [`ErrorKind`] discriminant is what the manager remembers as its last
//! error, since the full error may hold a non-cloneable transport error.

use storecart_core::{LineId, LineNotFound};
use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Error returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A precondition was not met. Fixable by the caller, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The named line is not in the cart.
    #[error("Not found: cart line {0}")]
    NotFound(LineId),

    /// The remote call failed or returned a non-2xx status.
    #[error("Network error: {0}")]
    Network(#[from] RemoteError),

    /// Another mutation is in flight; re-issue once it settles.
    #[error("Concurrency error: another cart operation is in progress")]
    Concurrency,

    /// Writing through to the local cache failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// The error's kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Network(_) => ErrorKind::Network,
            Self::Concurrency => ErrorKind::Concurrency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<LineNotFound> for CartError {
    fn from(err: LineNotFound) -> Self {
        Self::NotFound(err.0)
    }
}

/// Discriminant of [`CartError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Network,
    Concurrency,
    Storage,
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use storecart_core::CartItemId;

    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::validation("quantity must be at least 1");
        assert_eq!(err.to_string(), "Validation error: quantity must be at least 1");

        let err = CartError::NotFound(LineId::Remote(CartItemId::new(4)));
        assert_eq!(err.to_string(), "Not found: cart line 4");
    }

    #[test]
    fn test_cart_error_kinds() {
        assert_eq!(CartError::Concurrency.kind(), ErrorKind::Concurrency);
        assert_eq!(
            CartError::from(RemoteError::MissingCredential).kind(),
            ErrorKind::Network
        );
        let missing = LineId::Remote(CartItemId::new(1));
        assert_eq!(
            CartError::from(LineNotFound(missing)).kind(),
            ErrorKind::NotFound
        );
    }
}
