//! Command implementations.

pub mod auth;
pub mod cart;

use std::str::FromStr;

use storecart_client::config::ConfigError;
use storecart_client::remote::{RemoteCartClient, RemoteError};
use storecart_client::{CartError, CartSession, ClientConfig};
use storecart_core::{LineId, LineIdParseError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// A catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] RemoteError),

    /// A line id argument could not be parsed.
    #[error(transparent)]
    LineId(#[from] LineIdParseError),

    /// Storing or erasing the credential failed.
    #[error("Profile error: {0}")]
    Storage(#[from] storecart_client::storage::StorageError),
}

/// An open session plus the client used for catalog lookups.
pub struct Context {
    pub session: CartSession,
    pub client: RemoteCartClient,
}

impl Context {
    /// Load configuration from the environment and open the profile.
    pub async fn open() -> Result<Self, CommandError> {
        let config = ClientConfig::from_env()?;
        tracing::debug!(
            api_url = %config.api_url,
            profile = %config.profile_dir.display(),
            "Opening cart session"
        );
        let (session, client) = CartSession::open(&config).await?;
        Ok(Self { session, client })
    }

    /// Wait for in-flight work and stop the session.
    pub async fn close(self) {
        self.session.shutdown().await;
    }
}

/// Parse a line id as printed by `show`.
pub fn parse_line_id(raw: &str) -> Result<LineId, CommandError> {
    Ok(LineId::from_str(raw.trim())?)
}
