//! Integration tests for Storecart.
//!
//! Runs the real [`RemoteCartClient`] and [`CartSession`] against an
//! in-process axum server that speaks the cart service's REST dialect.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storecart-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use storecart_client::remote::{CartService, RemoteCartClient};
use storecart_client::storage::{FileProfileStore, ProfileStore};
use storecart_client::{AuthSignal, CartOptions, CartSession, ClientConfig};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Bearer token the fake server accepts.
pub const TOKEN: &str = "integration-token";

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Backend {
    products: HashMap<i64, Value>,
    lines: Vec<Value>,
    next_id: i64,
    refused: HashSet<i64>,
    plain_failure: Option<u16>,
    paginate: bool,
    requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<Backend>>;

/// In-process fake of the cart service.
pub struct FakeServer {
    addr: SocketAddr,
    backend: Shared,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Bind to an ephemeral port and start serving.
    pub async fn start() -> Self {
        let backend: Shared = Arc::default();
        let app = Router::new()
            .route("/api/products/{id}/", get(get_product))
            .route("/api/cart/", get(list_lines).post(create_line))
            .route("/api/cart/clear/", post(clear_cart))
            .route("/api/cart/{id}/", put(update_line).delete(delete_line))
            .route("/api/orders/", post(create_order))
            .with_state(Arc::clone(&backend));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            backend,
            handle,
        }
    }

    /// Base URL the client should be configured with.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Add a catalog product.
    pub fn add_product(&self, id: i64, name: &str, price: &str, stock: u32) {
        self.lock().products.insert(
            id,
            json!({
                "id": id,
                "name": name,
                "description": "",
                "price": price,
                "image_url": format!("https://img.example/{id}.jpg"),
                "inventory_count": stock,
            }),
        );
    }

    /// Reject adds of `product_id` with a JSON error body.
    pub fn refuse(&self, product_id: i64) {
        self.lock().refused.insert(product_id);
    }

    /// Answer every cart call with `status` and a plain-text body.
    pub fn fail_plainly(&self, status: u16) {
        self.lock().plain_failure = Some(status);
    }

    /// Wrap cart listings in a paginated envelope.
    pub fn paginate(&self) {
        self.lock().paginate = true;
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    /// Requests other than `GET`.
    #[must_use]
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    /// Server-side cart lines.
    #[must_use]
    pub fn lines(&self) -> Vec<Value> {
        self.lock().lines.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A profile directory, a client, and a session over a [`FakeServer`].
pub struct TestContext {
    pub server: FakeServer,
    pub profile: TempDir,
    pub store: Arc<dyn ProfileStore>,
    pub auth: AuthSignal,
    pub client: RemoteCartClient,
}

impl TestContext {
    pub async fn new() -> Self {
        let server = FakeServer::start().await;
        let profile = tempfile::tempdir().unwrap();
        let config = ClientConfig::new(&server.api_url(), profile.path()).unwrap();
        let store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::new(profile.path()));
        let auth = AuthSignal::restore(Arc::clone(&store)).await;
        let client = RemoteCartClient::new(&config, auth.clone()).unwrap();
        Self {
            server,
            profile,
            store,
            auth,
            client,
        }
    }

    /// Start a session over this context's profile and client.
    pub async fn session(&self, options: CartOptions) -> CartSession {
        let remote: Arc<dyn CartService> = Arc::new(self.client.clone());
        CartSession::start(Arc::clone(&self.store), self.auth.clone(), remote, options).await
    }

    pub async fn sign_in(&self) {
        self.auth.sign_in(SecretString::from(TOKEN)).await.unwrap();
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Deserialize)]
struct CreateLine {
    product_id: i64,
    quantity: u32,
}

#[derive(Deserialize)]
struct UpdateLine {
    quantity: u32,
}

fn record(backend: &mut Backend, method: Method, path: String, body: Option<Value>) {
    backend.requests.push(Recorded { method, path, body });
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Shared guard for cart endpoints: bearer check, then forced failures.
fn guard(backend: &Backend, headers: &HeaderMap) -> Option<Response> {
    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Some(error(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.",
        ));
    }
    backend.plain_failure.map(|status| {
        let status = StatusCode::from_u16(status).unwrap();
        (status, "upstream exploded").into_response()
    })
}

async fn get_product(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::GET, format!("/products/{id}/"), None);
    backend.products.get(&id).map_or_else(
        || error(StatusCode::NOT_FOUND, "Not found."),
        |product| Json(product.clone()).into_response(),
    )
}

async fn list_lines(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::GET, "/cart/".to_string(), None);
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    let lines = backend.lines.clone();
    if backend.paginate {
        Json(json!({ "count": lines.len(), "next": null, "previous": null, "results": lines }))
            .into_response()
    } else {
        Json(Value::Array(lines)).into_response()
    }
}

async fn create_line(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::POST, "/cart/".to_string(), Some(body.clone()));
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    let Ok(request) = serde_json::from_value::<CreateLine>(body) else {
        return error(StatusCode::BAD_REQUEST, "Malformed line.");
    };
    if backend.refused.contains(&request.product_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Product unavailable" })),
        )
            .into_response();
    }
    let Some(product) = backend.products.get(&request.product_id).cloned() else {
        return error(StatusCode::NOT_FOUND, "Not found.");
    };

    if let Some(line) = backend
        .lines
        .iter_mut()
        .find(|l| l["product"]["id"] == request.product_id)
    {
        let quantity = line["quantity"].as_u64().unwrap_or(0) + u64::from(request.quantity);
        line["quantity"] = json!(quantity);
        return (StatusCode::OK, Json(line.clone())).into_response();
    }

    backend.next_id += 1;
    let line = json!({
        "id": backend.next_id,
        "user": 1,
        "product": product,
        "quantity": request.quantity,
    });
    backend.lines.push(line.clone());
    (StatusCode::CREATED, Json(line)).into_response()
}

async fn update_line(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::PUT, format!("/cart/{id}/"), Some(body.clone()));
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    let Ok(request) = serde_json::from_value::<UpdateLine>(body) else {
        return error(StatusCode::BAD_REQUEST, "Malformed quantity.");
    };
    match backend.lines.iter_mut().find(|l| l["id"] == id) {
        Some(line) => {
            line["quantity"] = json!(request.quantity);
            Json(line.clone()).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Not found."),
    }
}

async fn delete_line(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::DELETE, format!("/cart/{id}/"), None);
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    let before = backend.lines.len();
    backend.lines.retain(|l| l["id"] != id);
    if backend.lines.len() == before {
        return error(StatusCode::NOT_FOUND, "Not found.");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::POST, "/cart/clear/".to_string(), None);
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    backend.lines.clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn create_order(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = backend.lock().unwrap();
    record(&mut backend, Method::POST, "/orders/".to_string(), Some(body.clone()));
    if let Some(rejection) = guard(&backend, &headers) {
        return rejection;
    }
    let order = json!({
        "order": {
            "id": 77,
            "total_amount": body["total_amount"],
            "status": "pending",
            "created_at": "2026-01-05T10:00:00Z",
            "items": body["items"],
        },
        "payment_url": "https://pay.example/orders/77",
    });
    (StatusCode::CREATED, Json(order)).into_response()
}
