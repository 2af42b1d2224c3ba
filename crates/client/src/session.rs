//! Session wiring.
//!
//! A [`CartSession`] owns one profile's auth signal and cart manager and a
//! background task that turns auth transitions into cart reactions: a
//! drain on sign-in and an in-memory reset on sign-out.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthSignal, AuthState, AuthSubscription};
use crate::cache::LocalCartCache;
use crate::config::{CartOptions, ClientConfig};
use crate::error::Result;
use crate::manager::CartManager;
use crate::remote::{CartService, RemoteCartClient};
use crate::storage::{FileProfileStore, ProfileStore};

/// A running cart session.
///
/// Dropping the session stops reacting to auth transitions; prefer
/// [`CartSession::shutdown`], which waits for the reaction in progress.
pub struct CartSession {
    auth: AuthSignal,
    manager: CartManager,
    listener: Option<JoinHandle<()>>,
}

impl CartSession {
    /// Open the profile named by `config` and start a session over the
    /// REST cart service.
    ///
    /// A token in `config` replaces any stored credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the token
    /// cannot be stored.
    pub async fn open(config: &ClientConfig) -> Result<(Self, RemoteCartClient)> {
        let store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::new(&config.profile_dir));
        let auth = AuthSignal::restore(Arc::clone(&store)).await;
        if let Some(token) = &config.token {
            auth.sign_in(token.clone()).await?;
        }

        let client = RemoteCartClient::new(config, auth.clone())?;
        let remote: Arc<dyn CartService> = Arc::new(client.clone());
        let session = Self::start(store, auth, remote, config.cart).await;
        Ok((session, client))
    }

    /// Start a session from its parts.
    ///
    /// A session that starts signed in drains any offline cart left in the
    /// profile, exactly as if the user had just signed in. A session that
    /// starts signed out loads the offline cart.
    pub async fn start(
        store: Arc<dyn ProfileStore>,
        auth: AuthSignal,
        remote: Arc<dyn CartService>,
        options: CartOptions,
    ) -> Self {
        let manager = CartManager::new(remote, LocalCartCache::new(store), auth.clone(), options);

        // Subscribe first so a transition during start-up is not lost.
        let transitions = auth.subscribe();
        match transitions.current() {
            AuthState::Authenticated => {
                if let Err(e) = manager.on_signed_in().await {
                    warn!(error = %e, "Initial drain failed");
                }
            }
            AuthState::Unauthenticated => {
                if let Err(e) = manager.refresh().await {
                    warn!(error = %e, "Failed to load offline cart");
                }
            }
        }

        let listener = tokio::spawn(follow_auth(manager.clone(), transitions));
        info!(state = ?auth.state(), "Cart session started");

        Self {
            auth,
            manager,
            listener: Some(listener),
        }
    }

    /// The session's cart manager.
    #[must_use]
    pub const fn manager(&self) -> &CartManager {
        &self.manager
    }

    /// The session's auth signal.
    #[must_use]
    pub const fn auth(&self) -> &AuthSignal {
        &self.auth
    }

    /// Stop following auth transitions.
    ///
    /// Waits for any cart operation already in flight to settle.
    pub async fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            if let Err(e) = listener.await
                && e.is_panic()
            {
                warn!(error = %e, "Auth listener panicked");
            }
        }
        self.manager.settle().await;
        debug!("Cart session stopped");
    }
}

impl Drop for CartSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("auth", &self.auth)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

/// React to each transition, one at a time, in order.
async fn follow_auth(manager: CartManager, mut transitions: AuthSubscription) {
    while let Some(state) = transitions.changed().await {
        match state {
            AuthState::Authenticated => match manager.on_signed_in().await {
                Ok(report) if !report.is_complete() => {
                    warn!(failed = report.failed.len(), "Some offline lines were not synced");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Drain after sign-in failed"),
            },
            AuthState::Unauthenticated => manager.on_signed_out().await,
        }
    }
    debug!("Auth signal dropped, listener exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use storecart_core::ProductId;

    use super::*;
    use crate::manager::SyncEvent;
    use crate::storage::MemoryProfileStore;
    use crate::testing::{Call, FakeCartService, product};

    const WAIT: Duration = Duration::from_secs(2);

    async fn offline_profile(lines: &[(i64, u32)]) -> Arc<dyn ProfileStore> {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
        let cache = LocalCartCache::new(Arc::clone(&store));
        let mut cart = storecart_core::Cart::new();
        for &(id, quantity) in lines {
            cart.add_product(
                &product(id, 100),
                std::num::NonZeroU32::new(quantity).unwrap(),
            );
        }
        cache.replace(&cart).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_sign_in_drains_once() {
        let store = offline_profile(&[(1, 2), (2, 1)]).await;
        let auth = AuthSignal::new(Arc::clone(&store));
        let remote = FakeCartService::new();
        let session = CartSession::start(
            Arc::clone(&store),
            auth.clone(),
            Arc::clone(&remote) as Arc<dyn CartService>,
            CartOptions::default(),
        )
        .await;
        assert_eq!(session.manager().cart().len(), 2);

        let mut events = session.manager().subscribe_sync();
        auth.sign_in(SecretString::from("t")).await.unwrap();
        let completed = tokio::time::timeout(WAIT, async {
            loop {
                if let SyncEvent::Completed(report) = events.recv().await.unwrap() {
                    return report;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(completed.synced, 2);

        // A token refresh is not a second transition.
        auth.sign_in(SecretString::from("t2")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            remote.writes(),
            vec![
                Call::Create(ProductId::new(1), 2),
                Call::Create(ProductId::new(2), 1)
            ]
        );
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_signed_in_drains_leftover_cache() {
        let store = offline_profile(&[(5, 3)]).await;
        let auth = AuthSignal::new(Arc::clone(&store));
        auth.sign_in(SecretString::from("t")).await.unwrap();
        let remote = FakeCartService::new();

        let session = CartSession::start(
            Arc::clone(&store),
            auth,
            Arc::clone(&remote) as Arc<dyn CartService>,
            CartOptions::default(),
        )
        .await;

        assert_eq!(remote.writes(), vec![Call::Create(ProductId::new(5), 3)]);
        assert_eq!(session.manager().cart().len(), 1);
        assert!(LocalCartCache::new(store).load().await.is_empty());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_sign_out_resets_memory_only() {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
        let auth = AuthSignal::new(Arc::clone(&store));
        auth.sign_in(SecretString::from("t")).await.unwrap();
        let remote = FakeCartService::new();
        remote.seed_line(&product(1, 100), 1);

        let session = CartSession::start(
            Arc::clone(&store),
            auth.clone(),
            Arc::clone(&remote) as Arc<dyn CartService>,
            CartOptions::default(),
        )
        .await;
        assert_eq!(session.manager().cart().len(), 1);

        let mut state = session.manager().subscribe();
        auth.sign_out().await.unwrap();
        tokio::time::timeout(WAIT, state.wait_for(|s| s.cart.is_empty()))
            .await
            .unwrap()
            .unwrap();

        // The server cart is untouched; only our view of it is dropped.
        assert_eq!(remote.lines().len(), 1);
        assert!(!remote.writes().contains(&Call::Clear));
        session.shutdown().await;
    }
}
