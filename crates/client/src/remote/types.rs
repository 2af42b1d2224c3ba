//! Wire types for the cart service.

use serde::{Deserialize, Serialize};
use storecart_core::{CartLine, ProductId};

/// Body of `POST /cart/`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `PUT /cart/{id}/`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateLineRequest {
    pub quantity: u32,
}

/// Response of `GET /cart/`: a paginated envelope or a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CartListResponse {
    Page {
        results: Vec<CartLine>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
    },
    Bare(Vec<CartLine>),
}

impl CartListResponse {
    /// Lines in server order.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        match self {
            Self::Page { results, .. } | Self::Bare(results) => results,
        }
    }

    /// Line count reported by the server, when paginated.
    #[must_use]
    pub const fn reported_count(&self) -> Option<u64> {
        match self {
            Self::Page { count, .. } => *count,
            Self::Bare(_) => None,
        }
    }

    /// Whether the server reported further pages that were not fetched.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Page { next: Some(_), .. })
    }
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// First non-empty message field, in `message`, `detail`, `error` order.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        [self.message, self.detail, self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
    }
}

/// A successful response, which may carry no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Json(T),
    Empty,
}

impl<T> Reply<T> {
    /// The parsed body, if any.
    pub fn into_body(self) -> Option<T> {
        match self {
            Self::Json(body) => Some(body),
            Self::Empty => None,
        }
    }
}
