//! Session middleware configuration.
//!
//! Sets up in-memory sessions using tower-sessions. The cart only needs to
//! live as long as the visitor's browser session, so the cookie carries no
//! max-age and the store is process-local.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::ShopConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "atelier_session";

/// Create the session layer with an in-memory store.
///
/// The cookie expires with the browser session, matching the lifetime of
/// the cart it backs. `Secure` is set only when the shop is served over
/// HTTPS.
#[must_use]
pub fn create_session_layer(config: &ShopConfig) -> SessionManagerLayer<MemoryStore> {
    let store = MemoryStore::default();

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnSessionEnd)
        .with_secure(config.origin_is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
