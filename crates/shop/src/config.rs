//! Shop configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; the server starts without any of them
//! and the payment endpoints report the missing secret key at request
//! time.
//!
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 4242)
//! - `SHOP_PUBLIC_ORIGIN` - Public origin for return/asset URLs; when
//!   unset it is resolved per request from the `Origin` header or
//!   `x-forwarded-proto` + `Host`
//! - `SHOP_CATALOG_PATH` - Poster catalogue JSON file
//!   (default: crates/shop/content/posters.json)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key, surfaced to the
//!   client via `/api/config`
//! - `STRIPE_API_BASE` - Stripe API base URL (default:
//!   https://api.stripe.com; overridden in tests)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shop application configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public origin, normalised without a trailing slash
    pub public_origin: Option<String>,
    /// Path to the poster catalogue JSON file
    pub catalog_path: PathBuf,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret key; payment endpoints fail without it
    pub secret_key: Option<SecretString>,
    /// Publishable key handed to the client
    pub publishable_key: Option<String>,
    /// API base URL, overridable for tests
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but unparsable
    /// (bind address, port, public origin).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("SHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHOP_PORT", "4242")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOP_PORT".to_string(), e.to_string()))?;
        let public_origin = get_optional_env("SHOP_PUBLIC_ORIGIN")
            .map(|raw| parse_origin(&raw))
            .transpose()?;
        let catalog_path = PathBuf::from(get_env_or_default(
            "SHOP_CATALOG_PATH",
            "crates/shop/content/posters.json",
        ));
        let stripe = StripeConfig::from_env();
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            public_origin,
            catalog_path,
            stripe,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public origin is served over HTTPS, which decides
    /// the session cookie's `Secure` flag.
    #[must_use]
    pub fn origin_is_https(&self) -> bool {
        self.public_origin
            .as_deref()
            .is_some_and(|origin| origin.starts_with("https://"))
    }
}

impl StripeConfig {
    fn from_env() -> Self {
        Self {
            secret_key: get_optional_env("STRIPE_SECRET_KEY").map(SecretString::from),
            publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
        }
    }
}

/// Validate a configured public origin and strip any trailing slash.
fn parse_origin(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| {
        ConfigError::InvalidEnvVar("SHOP_PUBLIC_ORIGIN".to_string(), e.to_string())
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "SHOP_PUBLIC_ORIGIN".to_string(),
            "origin must include a host".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
