//! Session-scoped cart and checkout-contact persistence.
//!
//! The cart lives in the visitor's `tower-sessions` session under a fixed
//! key, alongside the last checkout contact the visitor typed (so the form
//! can be resumed). All writes are best-effort: a failed session write is
//! logged and never surfaces to the client.

use tower_sessions::Session;

use atelier_core::{Cart, CheckoutContact};

/// Session keys for cart and checkout data.
pub mod keys {
    /// Key for the visitor's cart lines.
    pub const CART_BACKUP: &str = "cart_backup";

    /// Key for the last checkout contact the visitor entered.
    pub const CHECKOUT_CONTACT: &str = "checkout_contact";
}

/// Load the visitor's cart from the session, empty when absent or unreadable.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(keys::CART_BACKUP)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Persist the cart to the session. An empty cart removes the key entirely.
pub async fn save_cart(session: &Session, cart: &Cart) {
    let result = if cart.is_empty() {
        session.remove::<Cart>(keys::CART_BACKUP).await.map(|_| ())
    } else {
        session.insert(keys::CART_BACKUP, cart).await
    };

    if let Err(error) = result {
        tracing::warn!(%error, "Failed to persist cart to session");
    }
}

/// Load the saved checkout contact, empty default when none was saved.
pub async fn load_contact(session: &Session) -> CheckoutContact {
    session
        .get::<CheckoutContact>(keys::CHECKOUT_CONTACT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Save the checkout contact as typed, before any validation.
pub async fn save_contact(session: &Session, contact: &CheckoutContact) {
    if let Err(error) = session.insert(keys::CHECKOUT_CONTACT, contact).await {
        tracing::warn!(%error, "Failed to persist checkout contact to session");
    }
}

/// Drop the saved checkout contact after a completed purchase.
pub async fn clear_contact(session: &Session) {
    if let Err(error) = session.remove::<CheckoutContact>(keys::CHECKOUT_CONTACT).await {
        tracing::warn!(%error, "Failed to clear checkout contact from session");
    }
}
