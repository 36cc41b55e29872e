//! Cart route handlers.
//!
//! JSON endpoints over the session cart. Every mutation loads the cart from
//! the session, runs the engine operation, persists the result, and returns
//! the enriched view so the storefront can re-render the drawer without a
//! second round trip.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{Cart, CartError, PricedLine};

use crate::error::{AppError, Result};
use crate::session_cart;
use crate::state::AppState;

/// Enriched cart view returned by every cart endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<PricedLine>,
    pub subtotal_cents: i64,
    pub item_count: u32,
}

impl CartView {
    /// Project the cart through the catalogue.
    #[must_use]
    pub fn from_cart(cart: &Cart, state: &AppState) -> Self {
        Self {
            items: cart.priced_lines(state.catalog()),
            subtotal_cents: cart.subtotal_cents(state.catalog()),
            item_count: cart.total_quantity(state.catalog()),
        }
    }
}

/// Envelope for cart mutations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutationResponse {
    pub cart: CartView,
    /// Whether the storefront should open the cart drawer.
    pub open_drawer: bool,
    /// Set when an addition was clamped to the per-order cap.
    pub notice: Option<String>,
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBody {
    pub poster_id: String,
    #[serde(default)]
    pub edition_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub poster_id: String,
    #[serde(default)]
    pub edition_id: Option<String>,
    pub quantity: f64,
}

/// Remove line request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBody {
    pub poster_id: String,
    #[serde(default)]
    pub edition_id: Option<String>,
}

/// GET /api/cart
///
/// # Errors
///
/// Infallible today; typed for uniformity with the mutations.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = session_cart::load_cart(&session).await;
    Ok(Json(CartView::from_cart(&cart, &state)))
}

/// POST /api/cart/add
///
/// # Errors
///
/// 404 for unknown posters or editions, 400 when the poster needs an
/// edition, 409 when the per-order cap leaves no allowance.
#[instrument(skip(state, session, payload))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    payload: std::result::Result<Json<AddBody>, JsonRejection>,
) -> Result<Json<CartMutationResponse>> {
    let Json(body) = payload.map_err(invalid_json)?;

    let mut cart = session_cart::load_cart(&session).await;
    let outcome = cart.add(
        state.catalog(),
        &body.poster_id,
        body.edition_id.as_deref(),
        body.quantity.unwrap_or(1.0),
    )?;
    session_cart::save_cart(&session, &cart).await;

    let notice = outcome
        .limit_hit
        .map(|limit| CartError::LimitReached { limit }.to_string());

    Ok(Json(CartMutationResponse {
        cart: CartView::from_cart(&cart, &state),
        open_drawer: outcome.open_drawer(),
        notice,
    }))
}

/// POST /api/cart/update
///
/// # Errors
///
/// 400 on a malformed body; the engine operation itself never fails.
#[instrument(skip(state, session, payload))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    payload: std::result::Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<CartMutationResponse>> {
    let Json(body) = payload.map_err(invalid_json)?;

    let mut cart = session_cart::load_cart(&session).await;
    cart.update_quantity(
        state.catalog(),
        &body.poster_id,
        body.edition_id.as_deref(),
        body.quantity,
    );
    session_cart::save_cart(&session, &cart).await;

    Ok(Json(mutation_response(&cart, &state)))
}

/// POST /api/cart/remove
///
/// # Errors
///
/// 400 on a malformed body.
#[instrument(skip(state, session, payload))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    payload: std::result::Result<Json<RemoveBody>, JsonRejection>,
) -> Result<Json<CartMutationResponse>> {
    let Json(body) = payload.map_err(invalid_json)?;

    let mut cart = session_cart::load_cart(&session).await;
    cart.remove(&body.poster_id, body.edition_id.as_deref());
    session_cart::save_cart(&session, &cart).await;

    Ok(Json(mutation_response(&cart, &state)))
}

/// POST /api/cart/clear
///
/// # Errors
///
/// Infallible today; typed for uniformity with the other mutations.
#[instrument(skip(state, session))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartMutationResponse>> {
    let mut cart = session_cart::load_cart(&session).await;
    cart.clear();
    session_cart::save_cart(&session, &cart).await;

    Ok(Json(mutation_response(&cart, &state)))
}

fn mutation_response(cart: &Cart, state: &AppState) -> CartMutationResponse {
    CartMutationResponse {
        cart: CartView::from_cart(cart, state),
        open_drawer: false,
        notice: None,
    }
}

pub(crate) fn invalid_json(_: JsonRejection) -> AppError {
    AppError::BadRequest("Invalid JSON payload.".to_string())
}
