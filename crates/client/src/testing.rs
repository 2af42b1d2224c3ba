//! Test doubles for the cart service and profile store.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storecart_core::{
    CartItemId, CartLine, CheckoutReceipt, LineId, OrderId, OrderPayload, OrderStatus,
    OrderSummary, Price, Product, ProductId,
};

use crate::auth::AuthSignal;
use crate::cache::LocalCartCache;
use crate::config::CartOptions;
use crate::manager::CartManager;
use crate::remote::{CartService, RemoteError, Result};
use crate::storage::{MemoryProfileStore, ProfileStore, StorageError, keys};

/// A call received by [`FakeCartService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(ProductId, u32),
    Update(CartItemId, u32),
    Delete(CartItemId),
    Clear,
    Order(OrderPayload),
}

#[derive(Default)]
struct FakeState {
    lines: Vec<CartLine>,
    next_id: i64,
    calls: Vec<Call>,
    catalog: HashMap<ProductId, Product>,
    refused: HashSet<ProductId>,
    transient_failures: u32,
    offline: bool,
    refuse_orders: bool,
    delay: Option<Duration>,
}

/// In-memory cart service that records every call.
#[derive(Default)]
pub struct FakeCartService {
    state: Mutex<FakeState>,
}

impl FakeCartService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `product` known so created lines carry its snapshot.
    pub fn stock(&self, product: &Product) {
        self.lock().catalog.insert(product.id, product.clone());
    }

    /// Reject adds of `product_id` with a 400.
    pub fn refuse(&self, product_id: ProductId) {
        self.lock().refused.insert(product_id);
    }

    /// Fail the next `n` adds with a 503.
    pub fn fail_next_creates(&self, n: u32) {
        self.lock().transient_failures = n;
    }

    /// Fail every call with a 503.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reject order creation with a 400.
    pub fn refuse_orders(&self) {
        self.lock().refuse_orders = true;
    }

    /// Delay every call.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Seed a server-side line.
    pub fn seed_line(&self, product: &Product, quantity: u32) -> CartItemId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = CartItemId::new(state.next_id);
        state.lines.push(CartLine {
            id: LineId::Remote(id),
            product: product.clone(),
            quantity,
            unit_price: None,
        });
        id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls other than `List`.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| *call != Call::List)
            .collect()
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.lock().lines.clone()
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Record `call` and return the configured delay, or fail if offline.
    fn enter(&self, call: Call) -> Result<Option<Duration>> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.offline {
            return Err(unavailable());
        }
        Ok(state.delay)
    }
}

fn unavailable() -> RemoteError {
    RemoteError::Api {
        status: 503,
        message: "Service unavailable".to_string(),
    }
}

fn not_found() -> RemoteError {
    RemoteError::Api {
        status: 404,
        message: "Not found.".to_string(),
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl CartService for FakeCartService {
    async fn list_lines(&self) -> Result<Vec<CartLine>> {
        pause(self.enter(Call::List)?).await;
        Ok(self.lines())
    }

    async fn create_line(&self, product_id: ProductId, quantity: NonZeroU32) -> Result<()> {
        pause(self.enter(Call::Create(product_id, quantity.get()))?).await;

        let mut state = self.lock();
        if state.refused.contains(&product_id) {
            return Err(RemoteError::Api {
                status: 400,
                message: "Product unavailable".to_string(),
            });
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(unavailable());
        }

        if let Some(line) = state.lines.iter_mut().find(|l| l.product.id == product_id) {
            line.quantity += quantity.get();
            return Ok(());
        }
        let snapshot = state
            .catalog
            .get(&product_id)
            .cloned()
            .unwrap_or_else(|| product(product_id.as_i64(), 100));
        state.next_id += 1;
        let id = CartItemId::new(state.next_id);
        state.lines.push(CartLine {
            id: LineId::Remote(id),
            product: snapshot,
            quantity: quantity.get(),
            unit_price: None,
        });
        Ok(())
    }

    async fn update_line(&self, id: CartItemId, quantity: NonZeroU32) -> Result<()> {
        pause(self.enter(Call::Update(id, quantity.get()))?).await;
        let mut state = self.lock();
        let line = state
            .lines
            .iter_mut()
            .find(|l| l.id == LineId::Remote(id))
            .ok_or_else(not_found)?;
        line.quantity = quantity.get();
        Ok(())
    }

    async fn delete_line(&self, id: CartItemId) -> Result<()> {
        pause(self.enter(Call::Delete(id))?).await;
        let mut state = self.lock();
        let before = state.lines.len();
        state.lines.retain(|l| l.id != LineId::Remote(id));
        if state.lines.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        pause(self.enter(Call::Clear)?).await;
        self.lock().lines.clear();
        Ok(())
    }

    async fn create_order(&self, order: &OrderPayload) -> Result<CheckoutReceipt> {
        pause(self.enter(Call::Order(order.clone()))?).await;
        if self.lock().refuse_orders {
            return Err(RemoteError::Api {
                status: 400,
                message: "Insufficient stock".to_string(),
            });
        }
        Ok(CheckoutReceipt {
            order: OrderSummary {
                id: OrderId::new(1),
                total_amount: order.total_amount,
                status: OrderStatus::Pending,
                created_at: None,
                items: order.items.clone(),
            },
            payment_url: Some("https://pay.example/1".to_string()),
        })
    }
}

/// Profile store whose cart snapshot refuses writes.
///
/// Starts read-only; [`ReadOnlyProfileStore::writable`] starts open and
/// [`ReadOnlyProfileStore::freeze`] closes it later. [`ReadOnlyProfileStore::pin`]
/// makes erasing the snapshot fail as well. The credential key is always
/// writable so sessions can still sign in.
#[derive(Debug)]
pub struct ReadOnlyProfileStore {
    inner: MemoryProfileStore,
    read_only: AtomicBool,
    pinned: AtomicBool,
}

impl Default for ReadOnlyProfileStore {
    fn default() -> Self {
        Self {
            inner: MemoryProfileStore::new(),
            read_only: AtomicBool::new(true),
            pinned: AtomicBool::new(false),
        }
    }
}

impl ReadOnlyProfileStore {
    pub fn writable() -> Self {
        let store = Self::default();
        store.read_only.store(false, Ordering::SeqCst);
        store
    }

    pub fn freeze(&self) {
        self.read_only.store(true, Ordering::SeqCst);
    }

    pub fn pin(&self) {
        self.freeze();
        self.pinned.store(true, Ordering::SeqCst);
    }
}

fn read_only() -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "read-only profile",
    ))
}

#[async_trait]
impl ProfileStore for ReadOnlyProfileStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
        if key == keys::CART && self.read_only.load(Ordering::SeqCst) {
            return Err(read_only());
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> std::result::Result<(), StorageError> {
        if key == keys::CART && self.pinned.load(Ordering::SeqCst) {
            return Err(read_only());
        }
        self.inner.remove(key).await
    }
}

/// Product snapshot with unlimited stock.
pub fn product(id: i64, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: String::new(),
        price: Price::from_cents(cents),
        image_url: String::new(),
        inventory_count: None,
    }
}

/// Everything a manager test needs, wired over an in-memory profile.
pub struct Harness {
    pub remote: Arc<FakeCartService>,
    pub cache: LocalCartCache,
    pub auth: AuthSignal,
    pub manager: CartManager,
}

impl Harness {
    pub fn new(options: CartOptions) -> Self {
        Self::with_store(options, Arc::new(MemoryProfileStore::new()))
    }

    pub fn with_store(options: CartOptions, store: Arc<dyn ProfileStore>) -> Self {
        let remote = FakeCartService::new();
        let cache = LocalCartCache::new(Arc::clone(&store));
        let auth = AuthSignal::new(store);
        let manager = CartManager::new(
            Arc::clone(&remote) as Arc<dyn CartService>,
            cache.clone(),
            auth.clone(),
            options,
        );
        Self {
            remote,
            cache,
            auth,
            manager,
        }
    }

    #[allow(clippy::unwrap_used)]
    pub async fn sign_in(&self) {
        self.auth
            .sign_in(secrecy::SecretString::from("test-token"))
            .await
            .unwrap();
    }
}
