//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use storecart_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(CartItemId);

/// Identifier of a line within a cart.
///
/// Lines confirmed by the cart service carry the server's numeric id. Lines
/// created while signed out carry a locally generated placeholder which is
/// never sent to the server as a line id; the line is re-created by product
/// when the offline cart is drained.
///
/// Serialized untagged: remote ids as JSON numbers, placeholders as UUID
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineId {
    /// Id assigned by the remote cart service.
    Remote(CartItemId),
    /// Placeholder for a line that only exists offline.
    Local(Uuid),
}

impl LineId {
    /// Generate a fresh placeholder id for an offline line.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::Local(Uuid::new_v4())
    }

    /// The server id, if this line has been confirmed remotely.
    #[must_use]
    pub const fn remote(&self) -> Option<CartItemId> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Local(_) => None,
        }
    }

    /// Whether this is an offline placeholder.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Local(uuid) => write!(f, "{uuid}"),
        }
    }
}

impl From<CartItemId> for LineId {
    fn from(id: CartItemId) -> Self {
        Self::Remote(id)
    }
}

/// Error returned when a line id string is neither an integer nor a UUID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid line id: {0}")]
pub struct LineIdParseError(String);

impl FromStr for LineId {
    type Err = LineIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Remote(CartItemId::new(id)));
        }
        Uuid::parse_str(s)
            .map(Self::Local)
            .map_err(|_| LineIdParseError(s.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_id_serializes_untagged() {
        let remote = LineId::Remote(CartItemId::new(42));
        assert_eq!(serde_json::to_string(&remote).unwrap(), "42");

        let local = LineId::placeholder();
        let json = serde_json::to_string(&local).unwrap();
        assert!(json.starts_with('"'));
        assert_eq!(serde_json::from_str::<LineId>(&json).unwrap(), local);
        assert_eq!(serde_json::from_str::<LineId>("42").unwrap(), remote);
    }

    #[test]
    fn test_line_id_parse() {
        assert_eq!(
            "7".parse::<LineId>().unwrap(),
            LineId::Remote(CartItemId::new(7))
        );

        let uuid = Uuid::new_v4();
        assert_eq!(
            uuid.to_string().parse::<LineId>().unwrap(),
            LineId::Local(uuid)
        );

        assert!("not-an-id".parse::<LineId>().is_err());
    }

    #[test]
    fn test_placeholders_are_unique() {
        let a = LineId::placeholder();
        let b = LineId::placeholder();
        assert_ne!(a, b);
        assert!(a.is_placeholder());
        assert_eq!(a.remote(), None);
    }
}
