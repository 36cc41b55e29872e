//! End-to-end tests for the shop API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`, and
//! Stripe is a `wiremock` server the client is pointed at, so no real
//! network traffic is made. Session continuity across requests works the
//! same way a browser does: the `Set-Cookie` value from one response is
//! replayed on the next request.

#![allow(clippy::indexing_slicing)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_core::Catalog;
use atelier_shop::config::{ShopConfig, StripeConfig};
use atelier_shop::routes::build_app;
use atelier_shop::state::AppState;

/// The catalogue the binary ships with; tests run against the real data.
const CATALOG_JSON: &str = include_str!("../content/posters.json");

fn shop(api_base: &str, public_origin: Option<&str>, secret_key: Option<&str>) -> Router {
    let catalog = Catalog::from_json(CATALOG_JSON).expect("catalogue parses");
    let config = ShopConfig {
        host: "127.0.0.1".parse().expect("host"),
        port: 0,
        public_origin: public_origin.map(str::to_string),
        catalog_path: "content/posters.json".into(),
        stripe: StripeConfig {
            secret_key: secret_key.map(SecretString::from),
            publishable_key: Some("pk_test_shop".to_string()),
            api_base: api_base.to_string(),
        },
        sentry_dsn: None,
    };
    build_app(AppState::new(config, catalog))
}

/// A shop wired to an unreachable Stripe; fine for cart-only tests.
fn cart_only_shop() -> Router {
    shop("http://127.0.0.1:9", None, Some("sk_test_shop"))
}

struct TestResponse {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn call(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(String::from);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    TestResponse {
        status,
        cookie,
        body,
    }
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post_request(uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Form-decoded body of the most recent request the mock Stripe saw.
async fn stripe_form(server: &MockServer) -> Vec<(String, String)> {
    let requests = server.received_requests().await.expect("recorded requests");
    let request = requests.last().expect("at least one Stripe call");
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn created_session(id: &str) -> Value {
    json!({
        "id": id,
        "object": "checkout.session",
        "status": "open",
        "url": format!("https://checkout.stripe.com/c/pay/{id}")
    })
}

fn paid_session(id: &str) -> Value {
    json!({
        "id": id,
        "object": "checkout.session",
        "status": "complete",
        "payment_status": "paid",
        "amount_total": 9000,
        "currency": "usd",
        "customer_details": {"email": "ada@example.com", "name": "Ada Lovelace"},
        "line_items": {
            "object": "list",
            "data": [{
                "id": "li_1",
                "quantity": 2,
                "amount_subtotal": 9000,
                "amount_total": 9000,
                "currency": "usd",
                "description": "Night Swimmers",
                "price": {"product": {
                    "id": "prod_1",
                    "name": "Night Swimmers",
                    "images": ["https://darbymitchell.art/static/images/posters/night-swimmers.jpg"]
                }}
            }]
        },
        "metadata": {
            "items": "[{\"posterId\":\"night-swimmers\",\"editionId\":null,\"quantity\":2}]"
        }
    })
}

async fn mount_create(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn contact_body() -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "addressLine1": "12 Analytical Row",
        "city": "Cambridge",
        "region": "MA",
        "postalCode": "02139",
        "country": "US"
    })
}

// ---------------------------------------------------------------------------
// Health and client configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let app = cart_only_shop();

    let response = call(&app, get_request("/api/health", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"ok": true}));
}

#[tokio::test]
async fn config_exposes_publishable_key_and_countries() {
    let app = cart_only_shop();

    let response = call(&app, get_request("/api/config", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"publishableKey": "pk_test_shop", "allowedCountries": ["US", "CA"]})
    );
}

// ---------------------------------------------------------------------------
// Cart endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cart_starts_empty() {
    let app = cart_only_shop();

    let response = call(&app, get_request("/api/cart", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"items": [], "subtotalCents": 0, "itemCount": 0})
    );
}

#[tokio::test]
async fn add_persists_across_requests_via_session_cookie() {
    let app = cart_only_shop();

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 2}),
            None,
        ),
    )
    .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.body["openDrawer"], true);
    assert_eq!(added.body["notice"], Value::Null);
    assert_eq!(added.body["cart"]["items"][0]["lineTotalCents"], 9000);
    let cookie = added.cookie.expect("session cookie");

    let view = call(&app, get_request("/api/cart", Some(&cookie))).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.body["itemCount"], 2);
    assert_eq!(view.body["subtotalCents"], 9000);
    assert_eq!(view.body["items"][0]["displayName"], "Night Swimmers");
    assert_eq!(view.body["items"][0]["editionId"], Value::Null);
}

#[tokio::test]
async fn add_unknown_poster_is_404() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request("/api/cart/add", &json!({"posterId": "ghost"}), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({"error": "Poster could not be found."}));
}

#[tokio::test]
async fn add_editioned_poster_without_edition_is_400() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request("/api/cart/add", &json!({"posterId": "red-thread"}), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Select an edition before adding to cart."})
    );
}

#[tokio::test]
async fn add_unknown_edition_is_404() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "red-thread", "editionId": "ghost"}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        json!({"error": "The selected edition is unavailable."})
    );
}

#[tokio::test]
async fn add_clamps_to_cap_across_editions_and_notices() {
    let app = cart_only_shop();

    let first = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "red-thread", "editionId": "first-run", "quantity": 1}),
            None,
        ),
    )
    .await;
    let cookie = first.cookie.expect("session cookie");

    // Cap is 2 across the whole poster, so only 1 of the 5 fits.
    let second = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "red-thread", "editionId": "open-run", "quantity": 5}),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["openDrawer"], true);
    assert_eq!(
        second.body["notice"],
        "Limit reached: only 2 per person for this poster."
    );
    assert_eq!(second.body["cart"]["itemCount"], 2);

    let third = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "red-thread", "editionId": "first-run", "quantity": 1}),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(third.status, StatusCode::CONFLICT);
    assert_eq!(
        third.body,
        json!({"error": "Limit reached: only 2 per person for this poster."})
    );

    let view = call(&app, get_request("/api/cart", Some(&cookie))).await;
    assert_eq!(view.body["itemCount"], 2);
}

#[tokio::test]
async fn update_sets_quantity_and_zero_removes() {
    let app = cart_only_shop();

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 1}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");

    let updated = call(
        &app,
        post_request(
            "/api/cart/update",
            &json!({"posterId": "night-swimmers", "quantity": 3}),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["cart"]["items"][0]["quantity"], 3);
    assert_eq!(updated.body["openDrawer"], false);

    let removed = call(
        &app,
        post_request(
            "/api/cart/update",
            &json!({"posterId": "night-swimmers", "quantity": 0}),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(removed.body["cart"]["items"], json!([]));
}

#[tokio::test]
async fn remove_and_clear_empty_the_cart() {
    let app = cart_only_shop();

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 1}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");
    call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "red-thread", "editionId": "first-run", "quantity": 1}),
            Some(&cookie),
        ),
    )
    .await;

    let removed = call(
        &app,
        post_request(
            "/api/cart/remove",
            &json!({"posterId": "red-thread", "editionId": "first-run"}),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["cart"]["itemCount"], 1);

    let cleared = call(
        &app,
        post_request("/api/cart/clear", &json!({}), Some(&cookie)),
    )
    .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["cart"]["items"], json!([]));
    assert_eq!(cleared.body["cart"]["subtotalCents"], 0);
}

#[tokio::test]
async fn malformed_cart_body_is_400() {
    let app = cart_only_shop();

    let request = Request::builder()
        .method("POST")
        .uri("/api/cart/add")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .expect("request");
    let response = call(&app, request).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "Invalid JSON payload."}));
}

// ---------------------------------------------------------------------------
// POST /api/stripe/create-checkout-session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_session_resolves_prices_server_side() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_test_1")),
    )
    .await;
    let app = shop(&server.uri(), Some("https://darbymitchell.art"), Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": [
                {"posterId": "red-thread", "editionId": "first-run", "quantity": 1},
                {"posterId": "night-swimmers", "quantity": 2}
            ]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"sessionId": "cs_test_1"}));

    let form = stripe_form(&server).await;
    assert_eq!(form_value(&form, "mode"), Some("payment"));
    assert_eq!(
        form_value(&form, "success_url"),
        Some(
            "https://darbymitchell.art/posters/checkout/result?status=success&session_id={CHECKOUT_SESSION_ID}"
        )
    );
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("1"));
    assert_eq!(
        form_value(&form, "line_items[0][price_data][unit_amount]"),
        Some("9800")
    );
    assert_eq!(
        form_value(&form, "line_items[0][price_data][product_data][name]"),
        Some("The Red Thread — First Run")
    );
    assert_eq!(
        form_value(&form, "line_items[0][price_data][product_data][images][0]"),
        Some("https://darbymitchell.art/static/images/posters/red-thread.jpg")
    );
    assert_eq!(form_value(&form, "line_items[1][quantity]"), Some("2"));
    assert_eq!(
        form_value(&form, "line_items[1][price_data][unit_amount]"),
        Some("4500")
    );
    assert_eq!(
        form_value(&form, "shipping_address_collection[allowed_countries][0]"),
        Some("US")
    );
    assert_eq!(
        form_value(&form, "shipping_address_collection[allowed_countries][1]"),
        Some("CA")
    );

    let metadata: Value =
        serde_json::from_str(form_value(&form, "metadata[items]").expect("metadata"))
            .expect("metadata json");
    assert_eq!(
        metadata,
        json!([
            {"posterId": "red-thread", "editionId": "first-run", "quantity": 1},
            {"posterId": "night-swimmers", "editionId": null, "quantity": 2}
        ])
    );
}

#[tokio::test]
async fn create_session_accepts_legacy_single_item_body() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_legacy")),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"posterId": "night-swimmers"}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["sessionId"], "cs_legacy");

    let form = stripe_form(&server).await;
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("1"));
    assert!(form_value(&form, "line_items[1][quantity]").is_none());
}

#[tokio::test]
async fn create_session_merges_duplicate_items() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_merge")),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": [
                {"posterId": "night-swimmers", "quantity": 2},
                {"posterId": "night-swimmers", "quantity": 3.7}
            ]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let form = stripe_form(&server).await;
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("5"));
    assert!(form_value(&form, "line_items[1][quantity]").is_none());
}

#[tokio::test]
async fn create_session_omits_images_for_localhost_origin() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_local")),
    )
    .await;
    let app = shop(&server.uri(), Some("http://localhost:5173"), Some("sk_test_shop"));

    call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"posterId": "night-swimmers", "quantity": 1}),
            None,
        ),
    )
    .await;

    let form = stripe_form(&server).await;
    assert!(form_value(&form, "line_items[0][price_data][product_data][images][0]").is_none());
    assert_eq!(
        form_value(&form, "cancel_url"),
        Some(
            "http://localhost:5173/posters/checkout/result?status=cancelled&session_id={CHECKOUT_SESSION_ID}"
        )
    );
}

#[tokio::test]
async fn create_session_forwards_customer_details() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_customer")),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({
                "items": [{"posterId": "night-swimmers", "quantity": 1}],
                "customer": contact_body()
            }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let form = stripe_form(&server).await;
    assert_eq!(form_value(&form, "customer_email"), Some("ada@example.com"));
    assert_eq!(
        form_value(&form, "payment_intent_data[receipt_email]"),
        Some("ada@example.com")
    );
    assert_eq!(
        form_value(&form, "payment_intent_data[shipping][name]"),
        Some("Ada Lovelace")
    );
    assert_eq!(
        form_value(&form, "payment_intent_data[shipping][address][postal_code]"),
        Some("02139")
    );

    let blob: Value =
        serde_json::from_str(form_value(&form, "metadata[customer]").expect("customer blob"))
            .expect("customer json");
    assert_eq!(blob["addressLine1"], "12 Analytical Row");
    assert_eq!(blob["addressLine2"], "");
}

#[tokio::test]
async fn create_session_rejects_invalid_customer() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_never")),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let mut customer = contact_body();
    customer["postalCode"] = json!("1234");
    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({
                "items": [{"posterId": "night-swimmers", "quantity": 1}],
                "customer": customer
            }),
            None,
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Enter a valid US ZIP code before checking out."})
    );
    assert!(
        server
            .received_requests()
            .await
            .expect("recorded requests")
            .is_empty()
    );
}

#[tokio::test]
async fn create_session_rejects_empty_items() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": []}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "No items supplied for checkout."})
    );
}

#[tokio::test]
async fn create_session_rejects_entry_without_poster_id() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": [{"quantity": 2}]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Each item must include a posterId."})
    );
}

#[tokio::test]
async fn create_session_rejects_sub_one_quantity() {
    let app = cart_only_shop();

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": [{"posterId": "night-swimmers", "quantity": 0}]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Each item quantity must be at least 1."})
    );
}

#[tokio::test]
async fn create_session_unknown_poster_is_404_and_skips_stripe() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_never")),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"items": [{"posterId": "ghost", "quantity": 1}]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, json!({"error": "Poster not found: ghost"}));
    assert!(
        server
            .received_requests()
            .await
            .expect("recorded requests")
            .is_empty()
    );
}

#[tokio::test]
async fn create_session_without_secret_key_is_500() {
    let app = shop("http://127.0.0.1:9", None, None);

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"posterId": "night-swimmers"}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"error": "Stripe secret key not configured on the server."})
    );
}

#[tokio::test]
async fn create_session_upstream_failure_is_masked_500() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({"error": {"message": "boom"}})),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        post_request(
            "/api/stripe/create-checkout-session",
            &json!({"posterId": "night-swimmers"}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"error": "Unable to create checkout session."})
    );
}

#[tokio::test]
async fn create_session_rejects_non_post_methods() {
    let app = cart_only_shop();

    let response = call(
        &app,
        get_request("/api/stripe/create-checkout-session", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body, json!({"error": "Method not allowed."}));
}

// ---------------------------------------------------------------------------
// GET /api/stripe/checkout-session/{session_id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_session_projects_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paid_session("cs_42")))
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(&app, get_request("/api/stripe/checkout-session/cs_42", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], "cs_42");
    assert_eq!(response.body["paymentStatus"], "paid");
    assert_eq!(response.body["amountTotal"], 9000);
    assert_eq!(response.body["customerEmail"], "ada@example.com");
    assert_eq!(response.body["customerName"], "Ada Lovelace");
    assert_eq!(response.body["lineItems"][0]["quantity"], 2);
    assert_eq!(response.body["lineItems"][0]["amountSubtotal"], 9000);
    assert_eq!(response.body["lineItems"][0]["product"]["name"], "Night Swimmers");
    assert_eq!(
        response.body["metadata"]["items"],
        "[{\"posterId\":\"night-swimmers\",\"editionId\":null,\"quantity\":2}]"
    );

    // The session must be fetched with line items and products expanded.
    let requests = server.received_requests().await.expect("recorded requests");
    let query: Vec<(String, String)> = requests
        .last()
        .expect("request")
        .url
        .query_pairs()
        .into_owned()
        .collect();
    assert!(query.contains(&("expand[]".to_string(), "line_items".to_string())));
    assert!(query.contains(&(
        "expand[]".to_string(),
        "line_items.data.price.product".to_string()
    )));
}

#[tokio::test]
async fn retrieve_unknown_session_is_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"message": "No such checkout.session"}})),
        )
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let response = call(
        &app,
        get_request("/api/stripe/checkout-session/cs_missing", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        json!({"error": "Checkout session not found."})
    );
}

#[tokio::test]
async fn retrieve_blank_session_id_is_400() {
    let app = cart_only_shop();

    let response = call(&app, get_request("/api/stripe/checkout-session/%20", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "sessionId is required."}));
}

// ---------------------------------------------------------------------------
// POST /api/checkout (session-cart orchestration)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkout_with_empty_cart_is_400_but_saves_contact() {
    let app = cart_only_shop();

    let response = call(&app, post_request("/api/checkout", &contact_body(), None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Add a poster to your cart before checking out."})
    );

    // The contact was persisted before the cart check, so the form can be
    // resumed from the same session.
    let cookie = response.cookie.expect("session cookie");
    let saved = call(&app, get_request("/api/checkout/contact", Some(&cookie))).await;
    assert_eq!(saved.body["name"], "Ada Lovelace");
    assert_eq!(saved.body["postalCode"], "02139");
}

#[tokio::test]
async fn checkout_rejects_invalid_contact() {
    let app = cart_only_shop();

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 1}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");

    let mut contact = contact_body();
    contact["country"] = json!("FR");
    let response = call(&app, post_request("/api/checkout", &contact, Some(&cookie))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "Select a supported shipping country before checking out."})
    );
}

#[tokio::test]
async fn checkout_creates_session_from_session_cart() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_flow")),
    )
    .await;
    let app = shop(&server.uri(), Some("https://darbymitchell.art"), Some("sk_test_shop"));

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 2}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");

    let response = call(
        &app,
        post_request("/api/checkout", &contact_body(), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["sessionId"], "cs_flow");
    assert_eq!(
        response.body["checkoutUrl"],
        "https://checkout.stripe.com/c/pay/cs_flow"
    );

    // Quantities come from the session cart, prices from the catalogue.
    let form = stripe_form(&server).await;
    assert_eq!(form_value(&form, "line_items[0][quantity]"), Some("2"));
    assert_eq!(
        form_value(&form, "line_items[0][price_data][unit_amount]"),
        Some("4500")
    );
    assert_eq!(form_value(&form, "customer_email"), Some("ada@example.com"));
}

#[tokio::test]
async fn checkout_upstream_failure_keeps_cart() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(502).set_body_string("bad gateway"),
    )
    .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 2}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");

    let response = call(
        &app,
        post_request("/api/checkout", &contact_body(), Some(&cookie)),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({"error": "Unable to create checkout session."})
    );

    let view = call(&app, get_request("/api/cart", Some(&cookie))).await;
    assert_eq!(view.body["itemCount"], 2);
}

// ---------------------------------------------------------------------------
// GET /api/checkout/result
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_success_clears_cart_and_contact() {
    let server = MockServer::start().await;
    mount_create(
        &server,
        ResponseTemplate::new(200).set_body_json(created_session("cs_done")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_done"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paid_session("cs_done")))
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "night-swimmers", "quantity": 2}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");
    call(
        &app,
        post_request("/api/checkout", &contact_body(), Some(&cookie)),
    )
    .await;

    let result = call(
        &app,
        get_request(
            "/api/checkout/result?status=success&session_id=cs_done",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.body["session"]["paymentStatus"], "paid");
    assert_eq!(result.body["cart"]["items"], json!([]));
    assert_eq!(result.body["openDrawer"], false);

    let view = call(&app, get_request("/api/cart", Some(&cookie))).await;
    assert_eq!(view.body["itemCount"], 0);

    let contact = call(&app, get_request("/api/checkout/contact", Some(&cookie))).await;
    assert_eq!(contact.body["name"], "");
}

#[tokio::test]
async fn result_cancelled_restores_cart_from_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_back"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_back",
            "object": "checkout.session",
            "status": "open",
            "payment_status": "unpaid",
            "metadata": {
                "items": "[{\"posterId\":\"night-swimmers\",\"editionId\":null,\"quantity\":2}]"
            }
        })))
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    // No prior session: the restored cart is all this visitor has.
    let result = call(
        &app,
        get_request("/api/checkout/result?status=cancelled&session_id=cs_back", None),
    )
    .await;
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.body["cart"]["items"][0]["posterId"], "night-swimmers");
    assert_eq!(result.body["cart"]["items"][0]["quantity"], 2);
    assert_eq!(result.body["cart"]["itemCount"], 2);
    assert_eq!(result.body["openDrawer"], true);

    let cookie = result.cookie.expect("session cookie");
    let view = call(&app, get_request("/api/cart", Some(&cookie))).await;
    assert_eq!(view.body["itemCount"], 2);
}

#[tokio::test]
async fn result_cancelled_without_metadata_keeps_existing_cart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_bare"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_bare",
            "object": "checkout.session",
            "status": "open",
            "payment_status": "unpaid"
        })))
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let added = call(
        &app,
        post_request(
            "/api/cart/add",
            &json!({"posterId": "waiting-room", "quantity": 1}),
            None,
        ),
    )
    .await;
    let cookie = added.cookie.expect("session cookie");

    let result = call(
        &app,
        get_request(
            "/api/checkout/result?status=cancelled&session_id=cs_bare",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.body["cart"]["items"][0]["posterId"], "waiting-room");
    assert_eq!(result.body["openDrawer"], false);
}

#[tokio::test]
async fn result_accepts_legacy_checkout_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_legacy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_legacy",
            "object": "checkout.session",
            "status": "open",
            "payment_status": "unpaid"
        })))
        .mount(&server)
        .await;
    let app = shop(&server.uri(), None, Some("sk_test_shop"));

    let result = call(
        &app,
        get_request(
            "/api/checkout/result?checkout=cancelled&session_id=cs_legacy",
            None,
        ),
    )
    .await;
    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.body["session"]["id"], "cs_legacy");
}

#[tokio::test]
async fn result_rejects_unknown_status() {
    let app = cart_only_shop();

    let response = call(
        &app,
        get_request("/api/checkout/result?status=paid&session_id=cs_x", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body,
        json!({"error": "A valid checkout status is required."})
    );
}

#[tokio::test]
async fn result_requires_session_id() {
    let app = cart_only_shop();

    let response = call(&app, get_request("/api/checkout/result?status=success", None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({"error": "sessionId is required."}));
}
