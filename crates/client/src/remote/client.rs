//! REST implementation of [`CartService`].

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use storecart_core::{CartItemId, CartLine, CheckoutReceipt, OrderPayload, Product, ProductId};
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::types::{CartListResponse, CreateLineRequest, ErrorBody, Reply, UpdateLineRequest};
use super::{CartService, RemoteError, Result};
use crate::auth::AuthSignal;
use crate::config::ClientConfig;

/// Whether an endpoint requires the bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Credential required; calling without one is a caller bug.
    Bearer,
    /// Credential attached when available.
    Public,
}

/// Client for the cart, order, and product endpoints.
#[derive(Clone)]
pub struct RemoteCartClient {
    inner: Arc<RemoteCartClientInner>,
}

struct RemoteCartClientInner {
    client: reqwest::Client,
    base_url: Url,
    auth: AuthSignal,
}

impl RemoteCartClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, auth: AuthSignal) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("storecart/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(RemoteCartClientInner {
                client,
                base_url: config.api_url.clone(),
                auth,
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Fetch a product snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.call::<Product>(Method::GET, &format!("products/{id}/"), None, Access::Public)
            .await?
            .into_body()
            .ok_or_else(|| RemoteError::Parse("product response had no body".to_string()))
    }

    /// Execute a request and decode the reply.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        access: Access,
    ) -> Result<Reply<T>> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| RemoteError::Parse(format!("invalid endpoint {path}: {e}")))?;

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(ACCEPT, "application/json");

        match (self.inner.auth.bearer_token(), access) {
            (Some(token), _) => request = request.bearer_auth(token.expose_secret()),
            (None, Access::Bearer) => {
                error!(path, "Authenticated cart call issued without a bearer credential");
                return Err(RemoteError::MissingCredential);
            }
            (None, Access::Public) => {}
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::parse_error(response).await);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let text = response.text().await?;

        if !is_json || text.trim().is_empty() {
            debug!(path, status = %status, "Response has no JSON body");
            return Ok(Reply::Empty);
        }

        serde_json::from_str(&text).map(Reply::Json).map_err(|e| {
            error!(
                error = %e,
                path,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse cart service response"
            );
            RemoteError::Parse(e.to_string())
        })
    }

    /// Turn a non-2xx response into an API error.
    ///
    /// Uses the body's `message`, `detail`, or `error` field when present,
    /// otherwise a message derived from the status code.
    async fn parse_error(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str::<ErrorBody>(&text).ok())
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));

        warn!(status, message = %message, "Cart service returned an error");
        RemoteError::Api { status, message }
    }

    fn encode<B: serde::Serialize>(body: &B) -> Result<serde_json::Value> {
        serde_json::to_value(body).map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CartService for RemoteCartClient {
    #[instrument(skip(self))]
    async fn list_lines(&self) -> Result<Vec<CartLine>> {
        let reply = self
            .call::<CartListResponse>(Method::GET, "cart/", None, Access::Bearer)
            .await?;

        let Some(response) = reply.into_body() else {
            return Ok(Vec::new());
        };
        if response.is_truncated() {
            warn!(
                count = ?response.reported_count(),
                "Cart listing is paginated; only the first page was read"
            );
        }
        Ok(response.into_lines())
    }

    #[instrument(skip(self))]
    async fn create_line(&self, product_id: ProductId, quantity: NonZeroU32) -> Result<()> {
        let body = Self::encode(&CreateLineRequest {
            product_id,
            quantity: quantity.get(),
        })?;
        self.call::<serde_json::Value>(Method::POST, "cart/", Some(body), Access::Bearer)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_line(&self, id: CartItemId, quantity: NonZeroU32) -> Result<()> {
        let body = Self::encode(&UpdateLineRequest {
            quantity: quantity.get(),
        })?;
        self.call::<serde_json::Value>(
            Method::PUT,
            &format!("cart/{id}/"),
            Some(body),
            Access::Bearer,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_line(&self, id: CartItemId) -> Result<()> {
        self.call::<serde_json::Value>(Method::DELETE, &format!("cart/{id}/"), None, Access::Bearer)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.call::<serde_json::Value>(Method::POST, "cart/clear/", None, Access::Bearer)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(items = order.items.len(), total = %order.total_amount))]
    async fn create_order(&self, order: &OrderPayload) -> Result<CheckoutReceipt> {
        let body = Self::encode(order)?;
        self.call::<CheckoutReceipt>(Method::POST, "orders/", Some(body), Access::Bearer)
            .await?
            .into_body()
            .ok_or_else(|| RemoteError::Parse("order response had no body".to_string()))
    }
}

impl std::fmt::Debug for RemoteCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCartClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}
