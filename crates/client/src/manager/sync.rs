//! Offline-cart drain.
//!
//! On sign-in every line of the cached offline cart is replayed against
//! the remote cart as an add, one after another, in cache order. Each
//! attempt runs as its own task so a failing line never aborts the rest.
//! Lines the server rejects are dropped or kept depending on
//! [`SyncPolicy`].

use std::num::NonZeroU32;
use std::sync::Arc;

use storecart_core::{Cart, CartLine, ProductId};
use tracing::{info, warn};

use super::CartManager;
use crate::config::SyncPolicy;
use crate::error::ErrorKind;
use crate::remote::CartService;

/// Progress of a drain, broadcast to [`CartManager::subscribe_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The drain began with this many cached lines.
    Started { lines: usize },
    /// The line at `position` was accepted by the server.
    LineSynced {
        position: usize,
        product_id: ProductId,
        quantity: u32,
    },
    /// The line at `position` was refused after every attempt.
    LineFailed {
        position: usize,
        product_id: ProductId,
        error: String,
    },
    /// The drain finished and the cache was settled.
    Completed(SyncReport),
}

/// A cached line the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLine {
    pub position: usize,
    pub product_id: ProductId,
    pub quantity: u32,
    pub error: String,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Lines read from the offline cache.
    pub attempted: usize,
    /// Lines accepted by the server.
    pub synced: usize,
    /// Lines refused, in cache order.
    pub failed: Vec<FailedLine>,
    /// Lines left in the offline cache for a later drain. Equals
    /// `attempted` when the drained cache could not be erased.
    pub retained: usize,
}

impl SyncReport {
    /// Whether every cached line was accepted and the cache emptied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.retained == 0
    }
}

/// Replay the offline cart. Caller holds the write gate.
pub(super) async fn drain(manager: &CartManager) -> SyncReport {
    let inner = &manager.inner;
    let lines = inner.cache.load().await.into_lines();
    let retries = inner.options.sync_retries;

    emit(manager, SyncEvent::Started { lines: lines.len() });
    info!(lines = lines.len(), "Draining offline cart");

    let mut report = SyncReport {
        attempted: lines.len(),
        ..SyncReport::default()
    };
    let mut kept = Vec::new();

    for (position, line) in lines.into_iter().enumerate() {
        let product_id = line.product.id;
        let task = tokio::spawn(push_line(
            Arc::clone(&inner.remote),
            product_id,
            line.quantity,
            retries,
        ));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(format!("sync task failed: {e}")),
        };

        match outcome {
            Ok(()) => {
                report.synced += 1;
                emit(
                    manager,
                    SyncEvent::LineSynced {
                        position,
                        product_id,
                        quantity: line.quantity,
                    },
                );
            }
            Err(error) => {
                warn!(position, %product_id, error = %error, "Offline line was not synced");
                emit(
                    manager,
                    SyncEvent::LineFailed {
                        position,
                        product_id,
                        error: error.clone(),
                    },
                );
                report.failed.push(FailedLine {
                    position,
                    product_id,
                    quantity: line.quantity,
                    error,
                });
                kept.push(line);
            }
        }
    }

    report.retained = settle_cache(manager, report.attempted, kept).await;

    info!(
        synced = report.synced,
        failed = report.failed.len(),
        retained = report.retained,
        "Offline cart drained"
    );
    emit(manager, SyncEvent::Completed(report.clone()));
    report
}

/// Add one cached line remotely, retrying up to `retries` more times.
async fn push_line(
    remote: Arc<dyn CartService>,
    product_id: ProductId,
    quantity: u32,
    retries: u32,
) -> Result<(), String> {
    let quantity =
        NonZeroU32::new(quantity).ok_or_else(|| "cached line has zero quantity".to_string())?;

    let mut attempt = 0;
    loop {
        match remote.create_line(product_id, quantity).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(%product_id, attempt, error = %e, "Retrying offline line");
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Empty the cache, or keep refused lines under `KeepUnconfirmed`.
///
/// A cache that cannot keep the refused lines is erased instead, so lines
/// the server already accepted are never replayed. Returns the number of
/// lines left in the cache.
async fn settle_cache(manager: &CartManager, attempted: usize, kept: Vec<CartLine>) -> usize {
    let cache = &manager.inner.cache;

    if manager.inner.options.sync_policy == SyncPolicy::KeepUnconfirmed && !kept.is_empty() {
        let cart = Cart::from_lines(kept);
        match cache.replace(&cart).await {
            Ok(()) => return cart.len(),
            Err(e) => {
                warn!(error = %e, "Failed to keep unsynced lines, erasing offline cache");
                manager.note_error(ErrorKind::Storage);
            }
        }
    }

    match cache.erase().await {
        Ok(()) => 0,
        Err(e) => {
            warn!(error = %e, "Failed to erase drained offline cache");
            manager.note_error(ErrorKind::Storage);
            attempted
        }
    }
}

fn emit(manager: &CartManager, event: SyncEvent) {
    // No subscribers is fine.
    let _ = manager.inner.sync_events.send(event);
}
