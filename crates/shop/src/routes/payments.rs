//! Stripe payment-session route handlers.
//!
//! The raw API the storefront JavaScript talks to. Unlike `/api/checkout`,
//! these endpoints take explicit item lists and never touch the session
//! cart.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use atelier_core::{CheckoutContact, contact};

use crate::checkout::{self, ItemRequest, SessionSummary};
use crate::error::{AppError, Result};
use crate::routes::cart::invalid_json;
use crate::state::AppState;

/// Create-session request body.
///
/// Accepts either an `items` array or the legacy single-item shape with
/// the poster fields at the top level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub items: Option<Vec<ItemRequest>>,
    #[serde(default)]
    pub poster_id: Option<String>,
    #[serde(default)]
    pub edition_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub customer: Option<CheckoutContact>,
}

/// Create-session response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// POST /api/stripe/create-checkout-session
///
/// # Errors
///
/// 400 on invalid JSON, empty items, a malformed entry, or an invalid
/// customer block; 404 when a poster or edition does not resolve; 500 when
/// the secret key is missing or Stripe fails.
#[instrument(skip(state, headers, payload))]
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateSessionBody>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>> {
    let Json(body) = payload.map_err(invalid_json)?;

    let items = match body.items {
        Some(items) if !items.is_empty() => items,
        _ => body
            .poster_id
            .map(|poster_id| {
                vec![ItemRequest {
                    poster_id: Some(poster_id),
                    edition_id: body.edition_id,
                    quantity: body.quantity,
                }]
            })
            .unwrap_or_default(),
    };

    let customer = body.customer.as_ref().map(contact::validate).transpose()?;

    let origin = checkout::resolve_origin(&state, &headers);
    let created = checkout::create_session(&state, &origin, &items, customer.as_ref()).await?;

    Ok(Json(CreateSessionResponse {
        session_id: created.session_id,
    }))
}

/// Fallback for unsupported methods on the create endpoint.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed." })),
    )
        .into_response()
}

/// GET /api/stripe/checkout-session/{session_id}
///
/// # Errors
///
/// 400 on a blank id, 404 when Stripe does not know the session, 500 when
/// the secret key is missing or Stripe fails.
#[instrument(skip(state))]
pub async fn retrieve(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest("sessionId is required.".to_string()));
    }

    let summary = checkout::retrieve_summary(&state, session_id).await?;
    Ok(Json(summary))
}
