//! Cart recovery from a Checkout Session's metadata.
//!
//! Session creation echoes the aggregated cart into `metadata.items`. When
//! the visitor cancels on the hosted payment page, that blob is the source
//! of truth for rebuilding their cart.

use std::collections::HashMap;

use atelier_core::CartEntry;

/// Parse the `items` metadata blob into cart entries.
///
/// A missing key, malformed JSON, or a non-array payload yields no
/// entries, and individual entries are dropped when `posterId` is not a
/// string or the quantity is not a finite number of at least 1.
/// `editionId` keeps only string values.
#[must_use]
pub fn entries_from_metadata(metadata: Option<&HashMap<String, String>>) -> Vec<CartEntry> {
    let Some(raw) = metadata.and_then(|m| m.get("items")) else {
        return Vec::new();
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) else {
        return Vec::new();
    };
    let Some(entries) = parsed.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let poster_id = entry.get("posterId")?.as_str()?;
            let quantity = entry.get("quantity")?.as_f64()?;
            if !quantity.is_finite() || quantity < 1.0 {
                return None;
            }
            let edition_id = entry
                .get("editionId")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned);

            Some(CartEntry {
                poster_id: poster_id.to_owned(),
                edition_id,
                quantity,
            })
        })
        .collect()
}
