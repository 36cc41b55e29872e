//! Checkout orchestration route handlers.
//!
//! `POST /api/checkout` drives the whole flow server-side: persist the
//! contact for form resume, validate it, and create the Stripe session from
//! the session cart. `GET /api/checkout/result` reconciles the cart after
//! Stripe redirects back.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{CheckoutContact, contact};

use crate::checkout::{self, ItemRequest, SessionSummary, recovery};
use crate::error::{AppError, Result};
use crate::routes::cart::{CartView, invalid_json};
use crate::session_cart;
use crate::state::AppState;

/// Response to a begun checkout: where the browser should go next.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginCheckoutResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

/// Query parameters on the Stripe return URL.
#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub status: Option<String>,
    /// Legacy alias for `status`.
    #[serde(default)]
    pub checkout: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Reconciliation outcome: the session summary plus the cart as it now
/// stands.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResultResponse {
    pub session: SessionSummary,
    pub cart: CartView,
    /// True when a cancelled checkout restored lines worth showing.
    pub open_drawer: bool,
}

/// POST /api/checkout
///
/// # Errors
///
/// 400 when the cart is empty or the contact fails validation, 404 when a
/// cart line no longer resolves, 500 when Stripe is unreachable or not
/// configured. A failed attempt never mutates the cart.
#[instrument(skip(state, session, headers, payload))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    payload: std::result::Result<Json<CheckoutContact>, JsonRejection>,
) -> Result<Json<BeginCheckoutResponse>> {
    let Json(raw_contact) = payload.map_err(invalid_json)?;

    // Saved as typed, even when invalid, so the form can be resumed.
    session_cart::save_contact(&session, &raw_contact).await;

    let cart = session_cart::load_cart(&session).await;
    let priced = cart.priced_lines(state.catalog());
    if priced.is_empty() {
        return Err(AppError::BadRequest(
            "Add a poster to your cart before checking out.".to_string(),
        ));
    }

    let validated = contact::validate(&raw_contact)?;

    let items: Vec<ItemRequest> = priced
        .iter()
        .map(|line| ItemRequest {
            poster_id: Some(line.poster_id.clone()),
            edition_id: line.edition_id.clone(),
            quantity: Some(f64::from(line.quantity)),
        })
        .collect();

    let origin = checkout::resolve_origin(&state, &headers);
    let created = checkout::create_session(&state, &origin, &items, Some(&validated)).await?;

    Ok(Json(BeginCheckoutResponse {
        session_id: created.session_id,
        checkout_url: created.checkout_url,
    }))
}

/// GET /api/checkout/contact
///
/// # Errors
///
/// Infallible today; typed for uniformity with the other handlers.
#[instrument(skip(session))]
pub async fn saved_contact(session: Session) -> Result<Json<CheckoutContact>> {
    Ok(Json(session_cart::load_contact(&session).await))
}

/// GET /api/checkout/result
///
/// Retrieves the session summary first; only a successful lookup touches
/// the cart. `status=success` empties the cart and forgets the saved
/// contact. `status=cancelled` rebuilds the cart from the session's
/// `metadata.items` echo, keeping the existing cart when the echo is
/// missing or unusable.
///
/// # Errors
///
/// 400 on a missing or unrecognised status or a blank session id, 404 when
/// Stripe does not know the session, 500 on other upstream failures.
#[instrument(skip(state, session, query))]
pub async fn result(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ResultQuery>,
) -> Result<Json<CheckoutResultResponse>> {
    let status = query.status.or(query.checkout).unwrap_or_default();
    if status != "success" && status != "cancelled" {
        return Err(AppError::BadRequest(
            "A valid checkout status is required.".to_string(),
        ));
    }

    let session_id = query.session_id.unwrap_or_default();
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest("sessionId is required.".to_string()));
    }

    let summary = checkout::retrieve_summary(&state, session_id).await?;

    let mut cart = session_cart::load_cart(&session).await;
    let mut open_drawer = false;

    if status == "success" {
        cart.clear();
        session_cart::save_cart(&session, &cart).await;
        session_cart::clear_contact(&session).await;
    } else {
        let entries = recovery::entries_from_metadata(summary.metadata.as_ref());
        if !entries.is_empty() {
            let kept = cart.replace(state.catalog(), &entries);
            session_cart::save_cart(&session, &cart).await;
            open_drawer = kept > 0;
        }
    }

    Ok(Json(CheckoutResultResponse {
        session: summary,
        cart: CartView::from_cart(&cart, &state),
        open_drawer,
    }))
}
