//! HTTP route handlers for the shop.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/health                            - Health check
//! GET  /api/config                            - Publishable key + allowed countries
//!
//! # Cart (session-scoped, JSON)
//! GET  /api/cart                              - Enriched cart view
//! POST /api/cart/add                          - Add a (poster, edition) line
//! POST /api/cart/update                       - Set a line's quantity
//! POST /api/cart/remove                       - Remove a line
//! POST /api/cart/clear                        - Empty the cart
//!
//! # Checkout orchestration (session cart + contact)
//! POST /api/checkout                          - Validate contact, create session
//! GET  /api/checkout/contact                  - Saved contact for form resume
//! GET  /api/checkout/result                   - Reconcile after Stripe redirect
//!
//! # Payment sessions (explicit items, no session cart)
//! POST /api/stripe/create-checkout-session   - Create a Checkout Session
//! GET  /api/stripe/checkout-session/{id}     - Retrieve a session summary
//!
//! # Assets
//! GET  /static/*                              - Poster images and other assets
//! ```

pub mod cart;
pub mod checkout;
pub mod payments;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, header},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use atelier_core::ALLOWED_COUNTRIES;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the checkout orchestration routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::begin))
        .route("/contact", get(checkout::saved_contact))
        .route("/result", get(checkout::result))
}

/// Create the payment-session routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/create-checkout-session",
            post(payments::create).fallback(payments::method_not_allowed),
        )
        .route("/checkout-session/{session_id}", get(payments::retrieve))
}

/// Client-side configuration surfaced to the storefront.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub publishable_key: Option<String>,
    pub allowed_countries: [&'static str; 2],
}

/// Liveness health check endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Publishable key and shipping countries for the storefront.
async fn client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig {
        publishable_key: state.config().stripe.publishable_key.clone(),
        allowed_countries: ALLOWED_COUNTRIES,
    })
}

/// Build the complete application router.
///
/// Everything except the Sentry layers, which `main` adds outermost so
/// they also cover the middleware stack.
pub fn build_app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    // The storefront dev server runs on its own origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/config", get(client_config))
        .nest("/api/cart", cart_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/stripe", payment_routes())
        .nest_service("/static", ServeDir::new("crates/shop/static"))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
