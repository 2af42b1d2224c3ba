//! Cart state manager.
//!
//! Owns the in-memory cart for one session and decides, per operation,
//! whether it is served from the local cache (signed out) or the remote
//! cart service (signed in).
//!
//! # Concurrency
//!
//! Reads never block: the current [`CartState`] is published through a
//! `watch` channel. Mutations are serialized by a FIFO write gate, so they
//! apply in the order they were issued. With [`MutationPolicy::Reject`] a
//! mutation that finds the gate taken fails with [`CartError::Concurrency`]
//! instead of waiting. Auth transitions always wait.
//!
//! Once a mutation holds the gate its body runs on its own task, so a
//! caller that stops polling does not cancel a half-applied operation.

mod sync;

pub use sync::{FailedLine, SyncEvent, SyncReport};

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;

use storecart_core::{Cart, CheckoutReceipt, LineId, OrderPayload, Price, Product};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthSignal;
use crate::cache::LocalCartCache;
use crate::config::{CartOptions, MutationPolicy};
use crate::error::{CartError, ErrorKind, Result};
use crate::remote::CartService;

/// Capacity of the sync event channel.
const SYNC_EVENT_CAPACITY: usize = 64;

/// Observable manager state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartState {
    /// The current cart.
    pub cart: Cart,
    /// Whether a mutation or drain currently holds the write gate.
    pub sync_in_flight: bool,
    /// Kind of the error raised by the most recent operation, if any.
    pub last_error: Option<ErrorKind>,
}

/// Session cart manager.
///
/// Cheap to clone; clones share the same cart.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    remote: Arc<dyn CartService>,
    cache: LocalCartCache,
    auth: AuthSignal,
    options: CartOptions,
    state: watch::Sender<CartState>,
    write_gate: Arc<Mutex<()>>,
    sync_events: broadcast::Sender<SyncEvent>,
}

impl CartManager {
    /// Create a manager with an empty cart.
    ///
    /// Call [`CartManager::refresh`] (or start a [`crate::CartSession`]) to
    /// populate it.
    #[must_use]
    pub fn new(
        remote: Arc<dyn CartService>,
        cache: LocalCartCache,
        auth: AuthSignal,
        options: CartOptions,
    ) -> Self {
        let (state, _) = watch::channel(CartState::default());
        let (sync_events, _) = broadcast::channel(SYNC_EVENT_CAPACITY);
        Self {
            inner: Arc::new(CartManagerInner {
                remote,
                cache,
                auth,
                options,
                state,
                write_gate: Arc::new(Mutex::new(())),
                sync_events,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().cart.clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to drain progress.
    #[must_use]
    pub fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.sync_events.subscribe()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.inner.state.borrow().cart.total_price()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.inner.state.borrow().cart.total_items()
    }

    /// Kind of the most recent operation's error.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.inner.state.borrow().last_error
    }

    /// Whether a mutation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.state.borrow().sync_in_flight
    }

    /// The authentication signal this manager follows.
    #[must_use]
    pub fn auth(&self) -> &AuthSignal {
        &self.inner.auth
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of `product`.
    ///
    /// Signed in, the server creates or increments the line and the cart is
    /// re-read. Signed out, the line for the same product is incremented or
    /// a new placeholder line appended, and the cart is written through to
    /// the local cache.
    ///
    /// # Errors
    ///
    /// `Validation` if `quantity` is zero or the snapshot is out of stock,
    /// `Network` if the remote call fails, `Concurrency` under the reject
    /// policy, `Storage` if the cache write fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_line(&self, product: Product, quantity: u32) -> Result<Cart> {
        self.run(self.policy(), move |manager| async move {
            manager.add_line_locked(&product, quantity).await
        })
        .await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// `NotFound` if the line is not in the cart, plus the errors of
    /// [`CartManager::add_line`].
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, line_id: LineId, quantity: u32) -> Result<Cart> {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            return self.remove_line(line_id).await;
        };
        self.run(self.policy(), move |manager| async move {
            manager.update_quantity_locked(line_id, quantity).await
        })
        .await
    }

    /// Remove a line. Removing an absent line succeeds with the cart unchanged.
    ///
    /// # Errors
    ///
    /// `Network` if the remote delete fails, `Concurrency` under the reject
    /// policy, `Storage` if the cache write fails.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, line_id: LineId) -> Result<Cart> {
        self.run(self.policy(), move |manager| async move {
            manager.remove_line_locked(line_id).await
        })
        .await
    }

    /// Empty the cart.
    ///
    /// Clearing is authoritative locally and best-effort remotely: a failed
    /// remote clear is logged and the in-memory cart is emptied anyway.
    ///
    /// # Errors
    ///
    /// Only `Concurrency` under the reject policy.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        self.run(self.policy(), |manager| async move { manager.clear_locked().await })
            .await
    }

    /// Submit the cart as an order and clear it.
    ///
    /// Each line is priced from its product snapshot as it stands now. On
    /// failure the cart is left exactly as it was.
    ///
    /// # Errors
    ///
    /// `Validation` if the cart is empty or the session is signed out (no
    /// remote call is made), `Network` if the order is refused.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<CheckoutReceipt> {
        self.run(self.policy(), |manager| async move { manager.checkout_locked().await })
            .await
    }

    /// Drain the offline cart into the remote cart, then re-read it.
    ///
    /// Runs automatically once per sign-in; exposed for retrying lines kept
    /// by [`crate::config::SyncPolicy::KeepUnconfirmed`].
    ///
    /// # Errors
    ///
    /// `Validation` if the session is signed out. Individual line failures
    /// are reported in the returned [`SyncReport`], not as errors.
    #[instrument(skip(self))]
    pub async fn sync_local_cache_to_remote(&self) -> Result<SyncReport> {
        self.run(MutationPolicy::Queue, |manager| async move {
            manager.sync_locked().await
        })
        .await
    }

    /// Reload the cart from its source of truth.
    ///
    /// # Errors
    ///
    /// `Network` if the remote fetch fails; the previous cart is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Cart> {
        self.run(MutationPolicy::Queue, |manager| async move {
            manager.refresh_locked().await
        })
        .await
    }

    /// React to `unauthenticated -> authenticated`.
    pub(crate) async fn on_signed_in(&self) -> Result<SyncReport> {
        info!("Signed in, draining offline cart");
        self.sync_local_cache_to_remote().await
    }

    /// React to `authenticated -> unauthenticated`.
    ///
    /// Drops the in-memory cart. The offline cache is not touched; the next
    /// offline mutation starts from whatever it still holds.
    pub(crate) async fn on_signed_out(&self) {
        info!("Signed out, dropping in-memory cart");
        // Never fails under the queue policy.
        let _ = self
            .run(MutationPolicy::Queue, |manager| async move {
                manager.publish(Cart::new());
                Ok(())
            })
            .await;
    }

    /// Wait until no operation holds the write gate.
    pub(crate) async fn settle(&self) {
        drop(self.inner.write_gate.lock().await);
    }

    // =========================================================================
    // Operation bodies (write gate held)
    // =========================================================================

    async fn add_line_locked(&self, product: &Product, quantity: u32) -> Result<Cart> {
        let quantity = NonZeroU32::new(quantity)
            .ok_or_else(|| CartError::validation("quantity must be at least 1"))?;
        if product.is_out_of_stock() {
            return Err(CartError::validation(format!(
                "{} is out of stock",
                product.name
            )));
        }

        if self.inner.auth.is_authenticated() {
            self.inner.remote.create_line(product.id, quantity).await?;
            return self.reload_remote().await;
        }

        let mut cart = self.offline_cart().await;
        let line_id = cart.add_product(product, quantity);
        debug!(%line_id, "Added line offline");
        self.commit_local(cart).await
    }

    async fn update_quantity_locked(&self, line_id: LineId, quantity: NonZeroU32) -> Result<Cart> {
        if self.inner.auth.is_authenticated() {
            let remote_id = self
                .cart()
                .get(&line_id)
                .and_then(|line| line.id.remote())
                .ok_or(CartError::NotFound(line_id))?;
            self.inner.remote.update_line(remote_id, quantity).await?;
            return self.reload_remote().await;
        }

        let mut cart = self.offline_cart().await;
        cart.set_quantity(&line_id, quantity)?;
        self.commit_local(cart).await
    }

    async fn remove_line_locked(&self, line_id: LineId) -> Result<Cart> {
        let mut cart = if self.inner.auth.is_authenticated() {
            self.cart()
        } else {
            self.offline_cart().await
        };
        let Some(remote_id) = cart.get(&line_id).map(|line| line.id.remote()) else {
            debug!(%line_id, "Line already absent");
            return Ok(cart);
        };

        if !self.inner.auth.is_authenticated() {
            cart.remove(&line_id);
            return self.commit_local(cart).await;
        }

        let Some(remote_id) = remote_id else {
            // Placeholder lines never reached the server.
            cart.remove(&line_id);
            return Ok(self.publish(cart));
        };

        match self.inner.remote.delete_line(remote_id).await {
            Ok(()) => {}
            Err(e) if e.status() == Some(404) => {
                debug!(%line_id, "Line already deleted remotely");
            }
            Err(e) => return Err(e.into()),
        }
        self.reload_remote().await
    }

    async fn clear_locked(&self) -> Result<()> {
        if self.inner.auth.is_authenticated() {
            if let Err(e) = self.inner.remote.clear().await {
                warn!(error = %e, "Remote cart clear failed, clearing locally");
                self.note_error(ErrorKind::Network);
            }
        } else if let Err(e) = self.inner.cache.erase().await {
            warn!(error = %e, "Failed to erase cached cart");
            self.note_error(ErrorKind::Storage);
        }

        self.publish(Cart::new());
        Ok(())
    }

    async fn checkout_locked(&self) -> Result<CheckoutReceipt> {
        let cart = self.cart();
        if cart.is_empty() {
            return Err(CartError::validation("cannot check out an empty cart"));
        }
        if !self.inner.auth.is_authenticated() {
            return Err(CartError::validation("checkout requires a signed-in session"));
        }

        let payload = OrderPayload::from_cart(&cart);
        let receipt = self.inner.remote.create_order(&payload).await?;
        info!(
            order_id = %receipt.order.id,
            total = %payload.total_amount,
            "Order created"
        );

        self.clear_locked().await?;
        Ok(receipt)
    }

    async fn sync_locked(&self) -> Result<SyncReport> {
        if !self.inner.auth.is_authenticated() {
            return Err(CartError::validation(
                "syncing the offline cart requires a signed-in session",
            ));
        }

        let report = sync::drain(self).await;

        if let Err(e) = self.reload_remote().await {
            warn!(error = %e, "Failed to re-read cart after drain");
            self.note_error(e.kind());
        }
        Ok(report)
    }

    async fn refresh_locked(&self) -> Result<Cart> {
        if self.inner.auth.is_authenticated() {
            return self.reload_remote().await;
        }
        let cart = self.inner.cache.load().await;
        Ok(self.publish(cart))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn policy(&self) -> MutationPolicy {
        self.inner.options.mutation_policy
    }

    /// Replace the in-memory cart with the server's canonical cart.
    async fn reload_remote(&self) -> Result<Cart> {
        let lines = self.inner.remote.list_lines().await?;
        Ok(self.publish(Cart::from_lines(lines)))
    }

    /// The cart offline mutations start from.
    ///
    /// Always the cached snapshot, never memory: after a sign-out memory is
    /// empty while the cache may still hold lines a drain kept back.
    async fn offline_cart(&self) -> Cart {
        self.inner.cache.load().await
    }

    /// Write a signed-out cart through to the cache, then publish it.
    async fn commit_local(&self, cart: Cart) -> Result<Cart> {
        self.inner.cache.replace(&cart).await?;
        Ok(self.publish(cart))
    }

    fn publish(&self, cart: Cart) -> Cart {
        self.inner.state.send_modify(|state| state.cart = cart.clone());
        cart
    }

    fn note_error(&self, kind: ErrorKind) {
        self.inner
            .state
            .send_modify(|state| state.last_error = Some(kind));
    }

    /// Take the write gate and run `op` on its own task.
    async fn run<T, F, Fut>(&self, policy: MutationPolicy, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let gate = Arc::clone(&self.inner.write_gate);
        let permit = match policy {
            MutationPolicy::Queue => gate.lock_owned().await,
            MutationPolicy::Reject => gate.try_lock_owned().map_err(|_| {
                debug!("Cart operation rejected, another is in flight");
                CartError::Concurrency
            })?,
        };

        let in_flight = InFlight::begin(self.clone(), permit);
        let manager = self.clone();
        let task = tokio::spawn(async move {
            let _in_flight = in_flight;
            let result = op(manager.clone()).await;
            if let Err(e) = &result {
                manager.note_error(e.kind());
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // The runtime is shutting down; the operation never settled.
            Err(_) => Err(CartError::Concurrency),
        }
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("CartManager")
            .field("lines", &state.cart.len())
            .field("sync_in_flight", &state.sync_in_flight)
            .field("last_error", &state.last_error)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

/// Holds the write gate and flags the state busy until dropped.
struct InFlight {
    manager: CartManager,
    _permit: OwnedMutexGuard<()>,
}

impl InFlight {
    fn begin(manager: CartManager, permit: OwnedMutexGuard<()>) -> Self {
        manager.inner.state.send_modify(|state| {
            state.sync_in_flight = true;
            state.last_error = None;
        });
        Self {
            manager,
            _permit: permit,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.manager
            .inner
            .state
            .send_modify(|state| state.sync_in_flight = false);
    }
}
