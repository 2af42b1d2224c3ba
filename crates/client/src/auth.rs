//! Authentication state signal.
//!
//! Token acquisition happens elsewhere (a login form, an OAuth flow, the
//! CLI's `login` command); this module only records the resulting bearer
//! credential, exposes whether the session is authenticated, and notifies
//! subscribers when that flips. Replacing the token of an already
//! authenticated session is not a transition and notifies nobody.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::storage::{ProfileStore, StorageError, keys};

/// Two-valued authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    /// Whether this is [`AuthState::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    const fn of(token: Option<&SecretString>) -> Self {
        if token.is_some() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

/// Shared handle on the session's authentication state.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct AuthSignal {
    inner: Arc<AuthSignalInner>,
}

struct AuthSignalInner {
    token: watch::Sender<Option<SecretString>>,
    store: Arc<dyn ProfileStore>,
}

impl AuthSignal {
    /// Create a signed-out signal over a profile store.
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        let (token, _) = watch::channel(None);
        Self {
            inner: Arc::new(AuthSignalInner { token, store }),
        }
    }

    /// Restore the signal from the credential stored in the profile.
    ///
    /// A stored, non-empty token means the session starts authenticated.
    /// An unreadable profile starts signed out.
    pub async fn restore(store: Arc<dyn ProfileStore>) -> Self {
        let token = match store.get(keys::TOKEN).await {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting signed out");
                None
            }
        };

        let signal = Self::new(store);
        signal
            .inner
            .token
            .send_replace(token.map(|t| SecretString::from(t.trim().to_string())));
        signal
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        AuthState::of(self.inner.token.borrow().as_ref())
    }

    /// Whether the session is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The bearer credential, if signed in.
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.inner.token.borrow().clone()
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        let mut rx = self.inner.token.subscribe();
        let last = AuthState::of(rx.borrow_and_update().as_ref());
        AuthSubscription { rx, last }
    }

    /// Record a credential and become authenticated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential cannot be persisted; the
    /// state is left unchanged in that case.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, token: SecretString) -> Result<(), StorageError> {
        self.inner
            .store
            .set(keys::TOKEN, token.expose_secret())
            .await?;

        let flipped = self.inner.token.send_if_modified(|current| {
            let was_signed_in = current.is_some();
            *current = Some(token);
            !was_signed_in
        });
        if flipped {
            info!("Session authenticated");
        }
        Ok(())
    }

    /// Forget the credential and become unauthenticated.
    ///
    /// The in-memory state flips even if erasing the stored credential fails.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored credential cannot be erased.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        let flipped = self
            .inner
            .token
            .send_if_modified(|current| current.take().is_some());
        if flipped {
            info!("Session signed out");
        }
        self.inner.store.remove(keys::TOKEN).await
    }
}

impl std::fmt::Debug for AuthSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSignal")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Stream of authentication transitions.
pub struct AuthSubscription {
    rx: watch::Receiver<Option<SecretString>>,
    last: AuthState,
}

impl AuthSubscription {
    /// State observed when subscribing or at the last transition.
    #[must_use]
    pub const fn current(&self) -> AuthState {
        self.last
    }

    /// Wait for the next transition and return the new state.
    ///
    /// Returns `None` once the signal has been dropped.
    pub async fn changed(&mut self) -> Option<AuthState> {
        loop {
            self.rx.changed().await.ok()?;
            let state = AuthState::of(self.rx.borrow_and_update().as_ref());
            if state != self.last {
                self.last = state;
                return Some(state);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::MemoryProfileStore;

    #[tokio::test]
    async fn test_restore_from_stored_token() {
        let store = Arc::new(MemoryProfileStore::new());
        store.set(keys::TOKEN, "abc.def.ghi").await.unwrap();

        let signal = AuthSignal::restore(store).await;
        assert!(signal.is_authenticated());
        assert_eq!(
            signal.bearer_token().unwrap().expose_secret(),
            "abc.def.ghi"
        );
    }

    #[tokio::test]
    async fn test_restore_without_token_is_signed_out() {
        let store = Arc::new(MemoryProfileStore::new());
        store.set(keys::TOKEN, "   ").await.unwrap();

        let signal = AuthSignal::restore(store).await;
        assert_eq!(signal.state(), AuthState::Unauthenticated);
        assert!(signal.bearer_token().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_and_out_persist_token() {
        let store = Arc::new(MemoryProfileStore::new());
        let signal = AuthSignal::new(store.clone());

        signal.sign_in(SecretString::from("tok")).await.unwrap();
        assert_eq!(store.get(keys::TOKEN).await.unwrap().as_deref(), Some("tok"));

        signal.sign_out().await.unwrap();
        assert_eq!(store.get(keys::TOKEN).await.unwrap(), None);
        assert!(!signal.is_authenticated());
    }

    #[tokio::test]
    async fn test_transitions_are_edge_triggered() {
        let signal = AuthSignal::new(Arc::new(MemoryProfileStore::new()));
        let mut sub = signal.subscribe();
        assert_eq!(sub.current(), AuthState::Unauthenticated);

        signal.sign_in(SecretString::from("one")).await.unwrap();
        assert_eq!(sub.changed().await, Some(AuthState::Authenticated));

        // Token refresh while signed in is not a transition.
        signal.sign_in(SecretString::from("two")).await.unwrap();
        signal.sign_out().await.unwrap();
        assert_eq!(sub.changed().await, Some(AuthState::Unauthenticated));

        signal.sign_out().await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(50), sub.changed()).await;
        assert!(next.is_err());
    }
}
