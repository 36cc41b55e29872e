//! Application state shared across handlers.

use std::sync::Arc;

use atelier_core::Catalog;

use crate::config::ShopConfig;
use crate::stripe::StripeClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// poster catalogue, configuration, and the Stripe client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ShopConfig,
    catalog: Catalog,
    stripe: Option<StripeClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The Stripe client is only constructed when a secret key is configured;
    /// without one, checkout endpoints report the missing key at request time
    /// so the rest of the shop keeps working.
    #[must_use]
    pub fn new(config: ShopConfig, catalog: Catalog) -> Self {
        let stripe = config
            .stripe
            .secret_key
            .clone()
            .map(|key| StripeClient::new(config.stripe.api_base.clone(), key));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                stripe,
            }),
        }
    }

    /// Get a reference to the shop configuration.
    #[must_use]
    pub fn config(&self) -> &ShopConfig {
        &self.inner.config
    }

    /// Get a reference to the poster catalogue.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get the Stripe client, if a secret key was configured.
    #[must_use]
    pub fn stripe(&self) -> Option<&StripeClient> {
        self.inner.stripe.as_ref()
    }
}
