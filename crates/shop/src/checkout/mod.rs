//! Checkout Session orchestration.
//!
//! Turns cart lines into Stripe Checkout Sessions and projects retrieved
//! sessions into the summary shape the storefront renders. Prices and
//! display names always come from the catalogue; quantities are the only
//! thing the client controls.

pub mod recovery;

use std::collections::HashMap;

use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};
use url::Url;

use atelier_core::{ALLOWED_COUNTRIES, ResolveError, ValidatedContact};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stripe::{CheckoutSession, ProductField, SessionLineItem, StripeError};

/// Client message when no secret key is configured.
const MISSING_SECRET_KEY: &str = "Stripe secret key not configured on the server.";

/// Path on the public origin that Stripe redirects back to.
const RESULT_PATH: &str = "/posters/checkout/result";

/// One requested item as sent by the client.
///
/// Every field is optional at the wire level so validation can produce
/// precise messages instead of serde rejections.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[serde(default)]
    pub poster_id: Option<String>,
    #[serde(default)]
    pub edition_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// A validated `(poster, edition)` request with duplicates merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedItem {
    pub poster_id: String,
    pub edition_id: Option<String>,
    pub quantity: u32,
}

/// A freshly created Checkout Session.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session_id: String,
    /// Hosted payment page URL. Stripe always returns one for open
    /// sessions, but the field is optional on the wire.
    pub checkout_url: Option<String>,
}

/// Validate and merge requested items, preserving first-seen order.
///
/// Quantities are floored and duplicates of the same `(poster, edition)`
/// pair are summed, so the session Stripe sees has one line per pair no
/// matter how the client split it.
///
/// # Errors
///
/// Returns a bad-request error when an entry has no string `posterId` or
/// a quantity below 1.
pub fn aggregate_items(items: &[ItemRequest]) -> Result<Vec<AggregatedItem>> {
    let mut aggregated: Vec<AggregatedItem> = Vec::new();

    for item in items {
        let Some(poster_id) = &item.poster_id else {
            return Err(AppError::BadRequest(
                "Each item must include a posterId.".to_string(),
            ));
        };

        let quantity = item.quantity.unwrap_or(1.0);
        if !quantity.is_finite() || quantity < 1.0 {
            return Err(AppError::BadRequest(
                "Each item quantity must be at least 1.".to_string(),
            ));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let floored = quantity.floor().clamp(1.0, f64::from(u32::MAX)) as u32;

        let existing = aggregated.iter_mut().find(|entry| {
            entry.poster_id == *poster_id && entry.edition_id == item.edition_id
        });
        match existing {
            Some(entry) => entry.quantity = entry.quantity.saturating_add(floored),
            None => aggregated.push(AggregatedItem {
                poster_id: poster_id.clone(),
                edition_id: item.edition_id.clone(),
                quantity: floored,
            }),
        }
    }

    Ok(aggregated)
}

/// Create a Checkout Session for the requested items.
///
/// The secret-key check runs before any item validation. Prices, names,
/// and descriptions are resolved from the catalogue; the aggregated items
/// are echoed into the session's `metadata.items` so a cancelled checkout
/// can restore the cart.
///
/// # Errors
///
/// Returns an error when the secret key is missing, the items fail
/// validation, a reference does not resolve, or the Stripe call fails.
pub async fn create_session(
    state: &AppState,
    origin: &str,
    items: &[ItemRequest],
    customer: Option<&ValidatedContact>,
) -> Result<CreatedSession> {
    let Some(stripe) = state.stripe() else {
        return Err(AppError::Config(MISSING_SECRET_KEY));
    };

    if items.is_empty() {
        return Err(AppError::BadRequest(
            "No items supplied for checkout.".to_string(),
        ));
    }

    let aggregated = aggregate_items(items)?;
    let params = session_params(state, origin, &aggregated, customer)?;

    let session = stripe
        .create_checkout_session(&params)
        .await
        .map_err(|err| AppError::upstream("Unable to create checkout session.", err))?;

    Ok(CreatedSession {
        session_id: session.id,
        checkout_url: session.url,
    })
}

/// Build the form parameters for a Checkout Session create call.
fn session_params(
    state: &AppState,
    origin: &str,
    aggregated: &[AggregatedItem],
    customer: Option<&ValidatedContact>,
) -> Result<Vec<(String, String)>> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        (
            "success_url".to_string(),
            format!("{origin}{RESULT_PATH}?status=success&session_id={{CHECKOUT_SESSION_ID}}"),
        ),
        (
            "cancel_url".to_string(),
            format!("{origin}{RESULT_PATH}?status=cancelled&session_id={{CHECKOUT_SESSION_ID}}"),
        ),
    ];

    let asset_base = origin.trim_end_matches('/');
    let include_images = !origin_is_localhost(origin);

    for (index, item) in aggregated.iter().enumerate() {
        let resolved = state
            .catalog()
            .resolve(&item.poster_id, item.edition_id.as_deref())
            .map_err(|err| match err {
                ResolveError::PosterNotFound { poster_id } => {
                    AppError::NotFound(format!("Poster not found: {poster_id}"))
                }
                ResolveError::EditionRequired { poster_id }
                | ResolveError::EditionNotFound { poster_id, .. } => {
                    AppError::NotFound(format!("Edition not found for poster: {poster_id}"))
                }
            })?;

        params.push((
            format!("line_items[{index}][quantity]"),
            item.quantity.to_string(),
        ));
        params.push((
            format!("line_items[{index}][price_data][currency]"),
            resolved.poster.currency.clone(),
        ));
        params.push((
            format!("line_items[{index}][price_data][unit_amount]"),
            resolved.unit_price_cents().to_string(),
        ));
        params.push((
            format!("line_items[{index}][price_data][product_data][name]"),
            resolved.display_name(),
        ));
        params.push((
            format!("line_items[{index}][price_data][product_data][description]"),
            resolved.poster.description.clone(),
        ));

        // Stripe rejects image URLs it cannot fetch, so local dev origins
        // send none at all.
        if include_images {
            let image_url = format!(
                "{asset_base}/{}",
                resolved.poster.image.trim_start_matches('/')
            );
            params.push((
                format!("line_items[{index}][price_data][product_data][images][0]"),
                image_url,
            ));
        }
    }

    for (index, country) in ALLOWED_COUNTRIES.iter().enumerate() {
        params.push((
            format!("shipping_address_collection[allowed_countries][{index}]"),
            (*country).to_string(),
        ));
    }

    params.push(("metadata[items]".to_string(), items_metadata(aggregated)));

    if let Some(contact) = customer {
        let email = contact.email.as_str().to_string();
        params.push(("customer_email".to_string(), email.clone()));
        params.push(("payment_intent_data[receipt_email]".to_string(), email));
        params.push((
            "payment_intent_data[shipping][name]".to_string(),
            contact.name.clone(),
        ));

        let address = contact.provider_address();
        params.push((
            "payment_intent_data[shipping][address][line1]".to_string(),
            address.line1,
        ));
        if let Some(line2) = address.line2 {
            params.push((
                "payment_intent_data[shipping][address][line2]".to_string(),
                line2,
            ));
        }
        params.push((
            "payment_intent_data[shipping][address][city]".to_string(),
            address.city,
        ));
        params.push((
            "payment_intent_data[shipping][address][state]".to_string(),
            address.state,
        ));
        params.push((
            "payment_intent_data[shipping][address][postal_code]".to_string(),
            address.postal_code,
        ));
        params.push((
            "payment_intent_data[shipping][address][country]".to_string(),
            address.country,
        ));

        params.push((
            "metadata[customer]".to_string(),
            serde_json::json!({
                "name": contact.name,
                "email": contact.email,
                "addressLine1": contact.address_line1,
                "addressLine2": contact.address_line2.clone().unwrap_or_default(),
                "city": contact.city,
                "region": contact.region,
                "postalCode": contact.postal_code,
                "country": contact.country,
            })
            .to_string(),
        ));
    }

    Ok(params)
}

/// Serialise aggregated items for `metadata.items`, `editionId` explicit
/// null for editionless lines.
fn items_metadata(aggregated: &[AggregatedItem]) -> String {
    serde_json::Value::Array(
        aggregated
            .iter()
            .map(|item| {
                serde_json::json!({
                    "posterId": item.poster_id,
                    "editionId": item.edition_id,
                    "quantity": item.quantity,
                })
            })
            .collect(),
    )
    .to_string()
}

/// Whether the origin points at local development.
fn origin_is_localhost(origin: &str) -> bool {
    Url::parse(origin).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str() == Some("localhost")
    })
}

/// Resolve the public origin used for redirect and asset URLs.
///
/// The configured origin wins; otherwise fall back to the request's
/// `Origin` header, then to `x-forwarded-proto` plus `Host`.
#[must_use]
pub fn resolve_origin(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(origin) = &state.config().public_origin {
        return origin.clone();
    }

    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        return origin.trim_end_matches('/').to_string();
    }

    let protocol = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{protocol}://{host}")
}

/// Retrieve a Checkout Session and project it for the storefront.
///
/// # Errors
///
/// Returns a not-found error when Stripe does not know the session id,
/// and a generic upstream error for any other failure.
pub async fn retrieve_summary(state: &AppState, session_id: &str) -> Result<SessionSummary> {
    let Some(stripe) = state.stripe() else {
        return Err(AppError::Config(MISSING_SECRET_KEY));
    };

    let session = stripe
        .retrieve_checkout_session(session_id)
        .await
        .map_err(|err| match err {
            StripeError::SessionNotFound(_) => {
                AppError::NotFound("Checkout session not found.".to_string())
            }
            other => AppError::upstream("Unable to retrieve checkout session.", other),
        })?;

    Ok(SessionSummary::from(session))
}

/// The storefront-facing projection of a Checkout Session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Email the customer gave Stripe during payment, falling back to the
    /// one supplied at session creation.
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub line_items: Vec<LineItemSummary>,
    pub metadata: Option<HashMap<String, String>>,
}

/// One purchased line in the summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemSummary {
    pub id: String,
    pub quantity: Option<i64>,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    /// Present only when the product expansion came back as an object.
    pub product: Option<ProductSummary>,
}

/// Product attributes lifted from an expanded line item.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: Option<String>,
    pub images: Vec<String>,
}

impl From<CheckoutSession> for SessionSummary {
    fn from(session: CheckoutSession) -> Self {
        let details = session.customer_details;
        let customer_email = details
            .as_ref()
            .and_then(|d| d.email.clone())
            .or(session.customer_email);
        let customer_name = details.and_then(|d| d.name);

        Self {
            id: session.id,
            status: session.status,
            payment_status: session.payment_status,
            amount_total: session.amount_total,
            currency: session.currency,
            customer_email,
            customer_name,
            line_items: session
                .line_items
                .map(|list| list.data.into_iter().map(LineItemSummary::from).collect())
                .unwrap_or_default(),
            metadata: session.metadata,
        }
    }
}

impl From<SessionLineItem> for LineItemSummary {
    fn from(item: SessionLineItem) -> Self {
        let product = item
            .price
            .and_then(|price| price.product)
            .and_then(|product| match product {
                ProductField::Expanded(object) => Some(ProductSummary {
                    id: object.id,
                    name: object.name,
                    images: object.images,
                }),
                ProductField::Id(_) => None,
            });

        Self {
            id: item.id,
            quantity: item.quantity,
            amount_subtotal: item.amount_subtotal,
            amount_total: item.amount_total,
            currency: item.currency,
            description: item.description,
            product,
        }
    }
}
