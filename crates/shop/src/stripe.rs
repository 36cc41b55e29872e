//! Stripe Checkout API client.
//!
//! Talks to the [Checkout Sessions](https://docs.stripe.com/api/checkout/sessions)
//! REST endpoints directly: sessions are created from form-encoded parameters
//! and retrieved with the line items (and their products) expanded. The base
//! URL is configurable so tests can point the client at a mock server.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Checkout session not found.
    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Stripe API client for Checkout Sessions.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new Stripe API client rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            secret_key,
        }
    }

    /// Create a Checkout Session from form-encoded parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the response cannot be parsed.
    #[instrument(skip(self, params))]
    pub async fn create_checkout_session(
        &self,
        params: &[(String, String)],
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.secret_key.expose_secret(), Some(""))
            .form(params)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }

    /// Retrieve a Checkout Session with line items and products expanded.
    ///
    /// # Errors
    ///
    /// Returns [`StripeError::SessionNotFound`] when Stripe does not know the
    /// session id, or another error if the request fails.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(self.secret_key.expose_secret(), Some(""))
            .query(&[
                ("expand[]", "line_items"),
                ("expand[]", "line_items.data.price.product"),
            ])
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StripeError::SessionNotFound(session_id.to_string()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

/// Checkout Session resource.
///
/// Only the fields the shop reads are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Hosted payment page URL, present on newly created sessions.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Present only when the session is retrieved with `line_items` expanded.
    #[serde(default)]
    pub line_items: Option<LineItemList>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// Customer details collected during checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Paginated list wrapper around expanded line items.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemList {
    #[serde(default)]
    pub data: Vec<SessionLineItem>,
}

/// A single line item on a Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionLineItem {
    pub id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
}

/// Price attached to a line item.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    #[serde(default)]
    pub product: Option<ProductField>,
}

/// Product reference on a price: an expanded object, or a bare id when the
/// expansion was not requested.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductField {
    Expanded(ProductObject),
    Id(String),
}

/// Expanded product resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}
