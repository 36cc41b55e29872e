//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding to the client. All route handlers should return
//! `Result<T, AppError>`. Responses carry a JSON body of the form
//! `{"error": "..."}` so the storefront can surface the message directly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use atelier_core::{CartError, ContactError};

use crate::stripe::StripeError;

/// Application-level error type for the shop API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cart mutation rejected by a per-order purchase limit.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server-side configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(&'static str),

    /// Stripe API call failed.
    #[error("Stripe error: {source}")]
    Upstream {
        /// Message returned to the client in place of the raw failure.
        public: &'static str,
        /// Underlying Stripe failure.
        #[source]
        source: StripeError,
    },
}

impl AppError {
    /// Wrap a Stripe failure with the message the client should see.
    pub const fn upstream(public: &'static str, source: StripeError) -> Self {
        Self::Upstream { public, source }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        let message = err.to_string();
        match err {
            CartError::PosterNotFound { .. } | CartError::EditionUnavailable { .. } => {
                Self::NotFound(message)
            }
            CartError::EditionRequired { .. } => Self::BadRequest(message),
            CartError::LimitReached { .. } => Self::Conflict(message),
        }
    }
}

impl From<ContactError> for AppError {
    fn from(err: ContactError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Config(_) | Self::Upstream { .. }) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Config(_) | Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose raw upstream failures to clients
        let message = match self {
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::Conflict(msg) => msg,
            Self::Config(msg) => msg.to_string(),
            Self::Upstream { public, .. } => public.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
