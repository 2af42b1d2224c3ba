//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STORECART_API_URL` - Base URL of the cart/order REST service
//!
//! ## Optional
//! - `STORECART_PROFILE_DIR` - Directory for durable profile storage (default: .storecart)
//! - `STORECART_MUTATION_POLICY` - `queue` or `reject` (default: queue)
//! - `STORECART_SYNC_POLICY` - `discard` or `keep` (default: discard)
//! - `STORECART_SYNC_RETRIES` - Extra attempts per drained line (default: 0)
//! - `STORECART_TOKEN` - Bearer credential to seed the profile with

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// What a mutation does when another mutation is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPolicy {
    /// Wait for the in-flight mutation, then run (issuance order).
    #[default]
    Queue,
    /// Fail immediately with a concurrency error.
    Reject,
}

impl FromStr for MutationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected `queue` or `reject`, got `{other}`")),
        }
    }
}

/// What happens to offline lines the server refused during a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Clear the offline cache unconditionally once the batch settles.
    #[default]
    Discard,
    /// Write lines that failed back to the offline cache for a later retry.
    KeepUnconfirmed,
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "keep" | "keep-unconfirmed" => Ok(Self::KeepUnconfirmed),
            other => Err(format!("expected `discard` or `keep`, got `{other}`")),
        }
    }
}

/// Cart behaviour knobs shared by the manager and the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartOptions {
    /// Concurrent mutation handling.
    pub mutation_policy: MutationPolicy,
    /// Drain failure handling.
    pub sync_policy: SyncPolicy,
    /// Extra attempts per drained line before `sync_policy` applies.
    pub sync_retries: u32,
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST service, always ending in `/`
    pub api_url: Url,
    /// Directory holding durable profile storage
    pub profile_dir: PathBuf,
    /// Cart behaviour
    pub cart: CartOptions,
    /// Bearer credential to seed the profile with (redacted in `Debug`)
    pub token: Option<SecretString>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("STORECART_API_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("STORECART_API_URL".to_string(), e))?;
        let profile_dir = PathBuf::from(get_env_or_default("STORECART_PROFILE_DIR", ".storecart"));

        let cart = CartOptions {
            mutation_policy: parse_env("STORECART_MUTATION_POLICY", "queue")?,
            sync_policy: parse_env("STORECART_SYNC_POLICY", "discard")?,
            sync_retries: parse_env("STORECART_SYNC_RETRIES", "0")?,
        };

        let token = get_optional_env("STORECART_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Ok(Self {
            api_url,
            profile_dir,
            cart,
            token,
        })
    }

    /// Build a configuration for the given service URL with defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL is not http(s).
    pub fn new(api_url: &str, profile_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("api_url".to_string(), e))?;
        Ok(Self {
            api_url,
            profile_dir: profile_dir.into(),
            cart: CartOptions::default(),
            token: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and normalise the service base URL so relative joins keep its path.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_parse_api_url_appends_slash() {
        let url = parse_api_url("http://localhost:8000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/");
        assert_eq!(url.join("cart/").unwrap().path(), "/api/cart/");
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(parse_api_url("ftp://example.com").is_err());
        assert!(parse_api_url("not a url").is_err());
    }

    #[test]
    fn test_mutation_policy_parse() {
        assert_eq!("queue".parse::<MutationPolicy>().unwrap(), MutationPolicy::Queue);
        assert_eq!("REJECT".parse::<MutationPolicy>().unwrap(), MutationPolicy::Reject);
        assert!("later".parse::<MutationPolicy>().is_err());
    }

    #[test]
    fn test_sync_policy_parse() {
        assert_eq!("discard".parse::<SyncPolicy>().unwrap(), SyncPolicy::Discard);
        assert_eq!("keep".parse::<SyncPolicy>().unwrap(), SyncPolicy::KeepUnconfirmed);
        assert!("retry".parse::<SyncPolicy>().is_err());
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new("https://shop.example/api", "/tmp/profile").unwrap();
        assert_eq!(config.api_url.as_str(), "https://shop.example/api/");
        assert_eq!(config.cart, CartOptions::default());
        assert!(config.token.is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = ClientConfig::new("https://shop.example/api", "/tmp/profile").unwrap();
        config.token = Some(SecretString::from("super_secret_bearer_token"));

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("shop.example"));
        assert!(!debug_output.contains("super_secret_bearer_token"));
        assert_eq!(
            config.token.as_ref().unwrap().expose_secret(),
            "super_secret_bearer_token"
        );
    }
}
