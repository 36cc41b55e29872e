//! Cart engine: lines, order caps, and the priced view.
//!
//! The cart stores bare `(poster_id, edition_id, quantity)` lines and
//! knows nothing about prices; every read joins the lines back to the
//! [`Catalog`] so prices can never go stale or be tampered with.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ResolveError};

/// Errors raised by cart mutations.
///
/// Messages are the user-facing strings the shop shows verbatim.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The referenced poster is not in the catalogue.
    #[error("Poster could not be found.")]
    PosterNotFound {
        /// The id that failed to resolve.
        poster_id: String,
    },
    /// The poster declares editions and the request named none.
    #[error("Select an edition before adding to cart.")]
    EditionRequired {
        /// The poster missing an edition reference.
        poster_id: String,
    },
    /// The named edition does not belong to the poster.
    #[error("The selected edition is unavailable.")]
    EditionUnavailable {
        /// The poster the reference named.
        poster_id: String,
        /// The edition id that failed to resolve.
        edition_id: String,
    },
    /// The poster's per-order cap is already exhausted.
    #[error("Limit reached: only {limit} per person for this poster.")]
    LimitReached {
        /// The poster's per-order cap.
        limit: u32,
    },
}

impl From<ResolveError> for CartError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::PosterNotFound { poster_id } => Self::PosterNotFound { poster_id },
            ResolveError::EditionRequired { poster_id } => Self::EditionRequired { poster_id },
            ResolveError::EditionNotFound {
                poster_id,
                edition_id,
            } => Self::EditionUnavailable {
                poster_id,
                edition_id,
            },
        }
    }
}

/// One stored cart line. Quantities are always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Catalogue id of the poster.
    pub poster_id: String,
    /// Edition id, `None` for editionless posters.
    pub edition_id: Option<String>,
    /// How many of this line are in the cart.
    pub quantity: u32,
}

/// A candidate line for [`Cart::replace`], typically recovered from a
/// serialized snapshot. Quantities are raw numbers and get floored and
/// clamped during replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEntry {
    /// Catalogue id of the poster.
    pub poster_id: String,
    /// Edition id, `None` for editionless posters.
    pub edition_id: Option<String>,
    /// Raw requested quantity.
    pub quantity: f64,
}

/// Outcome of a successful [`Cart::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Quantity actually added, after clamping to the remaining allowance.
    pub added: u32,
    /// The poster's order cap, when the request was clamped to it.
    pub limit_hit: Option<u32>,
}

impl AddOutcome {
    /// Whether the HTTP layer should pop the cart drawer open.
    #[must_use]
    pub const fn open_drawer(&self) -> bool {
        self.added > 0
    }
}

/// One cart line joined to the catalogue with a resolved unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    /// Catalogue id of the poster.
    pub poster_id: String,
    /// Normalised edition id, `None` for editionless posters.
    pub edition_id: Option<String>,
    /// Display name, `"Title — Label"` when an edition is involved.
    pub display_name: String,
    /// How many of this line are in the cart.
    pub quantity: u32,
    /// Resolved unit price in cents; never taken from the client.
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`.
    pub line_total_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// Image path, relative to the public origin.
    pub image: String,
    /// Human-readable print size.
    pub dimensions: String,
}

/// A shopping cart: an ordered list of lines, at most one per
/// `(poster_id, edition_id)` pair.
///
/// Serializes transparently as the line array, which is also the shape
/// persisted in the session backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// The stored lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of stored lines (not summed quantity).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Adds a poster to the cart, merging into an existing
    /// `(poster, edition)` line when one exists.
    ///
    /// Quantities are floored first; anything below 1 (or non-finite)
    /// is a silent no-op. The per-order cap is enforced across all
    /// editions of the poster: a request that exceeds the remaining
    /// allowance is clamped to it and reports the cap in
    /// [`AddOutcome::limit_hit`].
    ///
    /// # Errors
    ///
    /// Returns an error when the reference does not resolve, or when
    /// the poster's allowance is already exhausted.
    pub fn add(
        &mut self,
        catalog: &Catalog,
        poster_id: &str,
        edition_id: Option<&str>,
        quantity: f64,
    ) -> Result<AddOutcome, CartError> {
        let requested = match floor_quantity(quantity) {
            Some(requested) if requested >= 1 => requested,
            _ => {
                return Ok(AddOutcome {
                    added: 0,
                    limit_hit: None,
                });
            }
        };

        let resolved = catalog.resolve(poster_id, edition_id)?;
        let edition_id = resolved.edition_id().map(str::to_owned);
        let limit = resolved.order_limit();

        let in_cart = self.quantity_for_poster(poster_id);
        let allowance = limit.map_or(u32::MAX, |cap| cap.saturating_sub(in_cart));
        if allowance == 0 {
            return Err(CartError::LimitReached {
                limit: limit.unwrap_or(0),
            });
        }

        let added = requested.min(allowance);
        let limit_hit = if added < requested { limit } else { None };

        match self.line_mut(poster_id, edition_id.as_deref()) {
            Some(line) => line.quantity = line.quantity.saturating_add(added),
            None => self.lines.push(CartLine {
                poster_id: poster_id.to_owned(),
                edition_id,
                quantity: added,
            }),
        }

        Ok(AddOutcome { added, limit_hit })
    }

    /// Deletes the exact `(poster, edition)` line. Idempotent.
    pub fn remove(&mut self, poster_id: &str, edition_id: Option<&str>) {
        self.lines.retain(|line| {
            line.poster_id != poster_id || line.edition_id.as_deref() != edition_id
        });
    }

    /// Sets a line's quantity, clamped to the poster's remaining
    /// allowance (the cap minus the poster's other lines).
    ///
    /// A floored quantity of zero or less behaves as [`Self::remove`];
    /// a non-finite quantity is ignored. Never raises an error.
    pub fn update_quantity(
        &mut self,
        catalog: &Catalog,
        poster_id: &str,
        edition_id: Option<&str>,
        quantity: f64,
    ) {
        let Some(requested) = floor_quantity(quantity) else {
            return;
        };
        if requested == 0 {
            self.remove(poster_id, edition_id);
            return;
        }

        let limit = catalog
            .get(poster_id)
            .and_then(|poster| poster.max_quantity_per_order);
        let others: u32 = self
            .lines
            .iter()
            .filter(|line| line.poster_id == poster_id && line.edition_id.as_deref() != edition_id)
            .map(|line| line.quantity)
            .fold(0, u32::saturating_add);
        let allowance = limit.map_or(u32::MAX, |cap| cap.saturating_sub(others));

        let next = requested.min(allowance);
        if next == 0 {
            self.remove(poster_id, edition_id);
            return;
        }
        if let Some(line) = self.line_mut(poster_id, edition_id) {
            line.quantity = next;
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Replaces the cart wholesale, validating each candidate entry
    /// independently.
    ///
    /// Entries that do not resolve, or whose quantity is non-finite,
    /// are dropped. Surviving quantities are floored and clamped to
    /// `1..=allowance`; duplicate `(poster, edition)` pairs merge.
    /// Returns the number of lines that survived.
    pub fn replace(&mut self, catalog: &Catalog, entries: &[CartEntry]) -> usize {
        let mut next: Vec<CartLine> = Vec::new();

        for entry in entries {
            let Ok(resolved) = catalog.resolve(&entry.poster_id, entry.edition_id.as_deref())
            else {
                continue;
            };
            let Some(floored) = floor_quantity(entry.quantity) else {
                continue;
            };
            let edition_id = resolved.edition_id().map(str::to_owned);

            let taken: u32 = next
                .iter()
                .filter(|line| line.poster_id == entry.poster_id)
                .map(|line| line.quantity)
                .fold(0, u32::saturating_add);
            let allowance = resolved
                .order_limit()
                .map_or(u32::MAX, |cap| cap.saturating_sub(taken));
            if allowance == 0 {
                continue;
            }
            let quantity = floored.max(1).min(allowance);

            let existing = next.iter_mut().find(|line| {
                line.poster_id == entry.poster_id
                    && line.edition_id.as_deref() == edition_id.as_deref()
            });
            match existing {
                Some(line) => line.quantity = line.quantity.saturating_add(quantity),
                None => next.push(CartLine {
                    poster_id: entry.poster_id.clone(),
                    edition_id,
                    quantity,
                }),
            }
        }

        let kept = next.len();
        self.lines = next;
        kept
    }

    /// The enriched view: lines joined to the catalogue with resolved
    /// prices. Lines that no longer resolve are silently dropped from
    /// the view, not from the stored cart.
    #[must_use]
    pub fn priced_lines(&self, catalog: &Catalog) -> Vec<PricedLine> {
        self.lines
            .iter()
            .filter_map(|line| {
                let resolved = catalog
                    .resolve(&line.poster_id, line.edition_id.as_deref())
                    .ok()?;
                let unit_price_cents = resolved.unit_price_cents();
                Some(PricedLine {
                    poster_id: line.poster_id.clone(),
                    edition_id: resolved.edition_id().map(str::to_owned),
                    display_name: resolved.display_name(),
                    quantity: line.quantity,
                    unit_price_cents,
                    line_total_cents: unit_price_cents * i64::from(line.quantity),
                    currency: resolved.poster.currency.clone(),
                    image: resolved.poster.image.clone(),
                    dimensions: resolved.poster.dimensions.clone(),
                })
            })
            .collect()
    }

    /// Sum of `line_total_cents` over the enriched view.
    #[must_use]
    pub fn subtotal_cents(&self, catalog: &Catalog) -> i64 {
        self.priced_lines(catalog)
            .iter()
            .map(|line| line.line_total_cents)
            .sum()
    }

    /// Sum of quantities over the enriched view.
    #[must_use]
    pub fn total_quantity(&self, catalog: &Catalog) -> u32 {
        self.priced_lines(catalog)
            .iter()
            .map(|line| line.quantity)
            .fold(0, u32::saturating_add)
    }

    fn line_mut(&mut self, poster_id: &str, edition_id: Option<&str>) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.poster_id == poster_id && line.edition_id.as_deref() == edition_id)
    }

    fn quantity_for_poster(&self, poster_id: &str) -> u32 {
        self.lines
            .iter()
            .filter(|line| line.poster_id == poster_id)
            .map(|line| line.quantity)
            .fold(0, u32::saturating_add)
    }
}

/// Floors a raw JSON quantity. `None` for non-finite input; values
/// below 1 floor to 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_quantity(quantity: f64) -> Option<u32> {
    if !quantity.is_finite() {
        return None;
    }
    let floored = quantity.floor().clamp(0.0, f64::from(u32::MAX));
    Some(floored as u32)
}
