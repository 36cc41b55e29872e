//! Poster catalogue: types, loading, and (poster, edition) resolution.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Errors that can occur when loading a [`Catalog`].
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The catalogue JSON could not be parsed.
    #[error("failed to parse catalogue: {0}")]
    Parse(#[from] serde_json::Error),
    /// Two posters share an id.
    #[error("duplicate poster id: {0}")]
    DuplicatePoster(String),
    /// Two editions of the same poster share an id.
    #[error("duplicate edition id {edition_id} for poster {poster_id}")]
    DuplicateEdition {
        /// Poster declaring the duplicate.
        poster_id: String,
        /// The repeated edition id.
        edition_id: String,
    },
}

/// Errors that can occur when resolving a `(poster, edition)` reference.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No poster with the given id exists.
    #[error("unknown poster: {poster_id}")]
    PosterNotFound {
        /// The id that failed to resolve.
        poster_id: String,
    },
    /// The poster declares editions and the reference names none.
    #[error("poster {poster_id} requires an edition")]
    EditionRequired {
        /// The poster missing an edition reference.
        poster_id: String,
    },
    /// The referenced edition does not belong to the poster.
    #[error("unknown edition {edition_id} for poster {poster_id}")]
    EditionNotFound {
        /// The poster the reference named.
        poster_id: String,
        /// The edition id that failed to resolve.
        edition_id: String,
    },
}

/// Whether a poster is a capped run or an open edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    /// A numbered run with limited stock.
    Limited,
    /// Printed on demand, no fixed run.
    Open,
}

/// A purchasable variant of a poster (paper stock, print run, size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edition {
    /// Unique within the owning poster.
    pub id: String,
    /// Short display label, e.g. "Archival giclée".
    pub label: String,
    /// Unit price in the smallest currency unit.
    pub price_cents: i64,
    /// Optional longer blurb shown on the product page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bullet-point details (paper weight, signing, numbering).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// A poster in the shop's catalogue.
///
/// A poster that declares editions requires a cart line to reference
/// exactly one of them; a poster without editions carries its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poster {
    /// Catalogue-wide unique id, used in cart lines and URLs.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Product page description, also forwarded to the payment provider.
    pub description: String,
    /// Base unit price in cents; editions override it.
    pub price_cents: i64,
    /// ISO currency code, lower-cased as the payment provider expects.
    pub currency: String,
    /// Image path, relative to the public origin.
    pub image: String,
    /// Human-readable print size, e.g. "18 × 24 in".
    pub dimensions: String,
    /// Whether the run is capped or open.
    pub inventory_status: InventoryStatus,
    /// Per-order cap, summed across all editions of this poster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity_per_order: Option<u32>,
    /// Whether the poster can currently be purchased.
    #[serde(default = "default_available")]
    pub is_available: bool,
    /// Editions of this poster, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editions: Vec<Edition>,
}

const fn default_available() -> bool {
    true
}

impl Poster {
    /// Whether cart lines for this poster must name an edition.
    #[must_use]
    pub fn requires_edition(&self) -> bool {
        !self.editions.is_empty()
    }

    /// Looks up an edition of this poster by id.
    #[must_use]
    pub fn edition(&self, edition_id: &str) -> Option<&Edition> {
        self.editions.iter().find(|edition| edition.id == edition_id)
    }
}

/// A `(poster, edition)` reference resolved against the catalogue.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedItem<'a> {
    /// The resolved poster.
    pub poster: &'a Poster,
    /// The resolved edition, `None` for editionless posters.
    pub edition: Option<&'a Edition>,
}

impl ResolvedItem<'_> {
    /// Unit price in cents: the edition's when present, else the poster's.
    #[must_use]
    pub fn unit_price_cents(&self) -> i64 {
        self.edition
            .map_or(self.poster.price_cents, |edition| edition.price_cents)
    }

    /// Display name: `"Title — Label"` when an edition is involved.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.edition.map_or_else(
            || self.poster.title.clone(),
            |edition| format!("{} — {}", self.poster.title, edition.label),
        )
    }

    /// The normalised edition id this reference resolved to.
    #[must_use]
    pub fn edition_id(&self) -> Option<&str> {
        self.edition.map(|edition| edition.id.as_str())
    }

    /// The poster's per-order cap, `None` when unlimited.
    #[must_use]
    pub const fn order_limit(&self) -> Option<u32> {
        self.poster.max_quantity_per_order
    }
}

/// The shop's immutable poster catalogue, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    posters: Vec<Poster>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalogue from already-parsed posters.
    ///
    /// # Errors
    ///
    /// Returns an error if two posters share an id, or two editions of
    /// the same poster do.
    pub fn from_posters(posters: Vec<Poster>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(posters.len());
        for (index, poster) in posters.iter().enumerate() {
            if by_id.insert(poster.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicatePoster(poster.id.clone()));
            }
            let mut edition_ids = HashSet::with_capacity(poster.editions.len());
            for edition in &poster.editions {
                if !edition_ids.insert(edition.id.as_str()) {
                    return Err(CatalogError::DuplicateEdition {
                        poster_id: poster.id.clone(),
                        edition_id: edition.id.clone(),
                    });
                }
            }
        }
        Ok(Self { posters, by_id })
    }

    /// Parses a catalogue from its JSON representation (an array of
    /// posters).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or ids are duplicated.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let posters: Vec<Poster> = serde_json::from_str(raw)?;
        Self::from_posters(posters)
    }

    /// Looks up a poster by id.
    #[must_use]
    pub fn get(&self, poster_id: &str) -> Option<&Poster> {
        self.by_id
            .get(poster_id)
            .and_then(|index| self.posters.get(*index))
    }

    /// Resolves a `(poster_id, edition_id)` reference to a priced item.
    ///
    /// Editionless posters ignore a stray edition reference and resolve
    /// with no edition.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown poster, a missing edition
    /// reference on a poster that declares editions, or an edition id
    /// the poster does not carry.
    pub fn resolve(
        &self,
        poster_id: &str,
        edition_id: Option<&str>,
    ) -> Result<ResolvedItem<'_>, ResolveError> {
        let poster = self.get(poster_id).ok_or_else(|| ResolveError::PosterNotFound {
            poster_id: poster_id.to_owned(),
        })?;

        if !poster.requires_edition() {
            return Ok(ResolvedItem {
                poster,
                edition: None,
            });
        }

        let Some(edition_id) = edition_id else {
            return Err(ResolveError::EditionRequired {
                poster_id: poster_id.to_owned(),
            });
        };

        let edition = poster
            .edition(edition_id)
            .ok_or_else(|| ResolveError::EditionNotFound {
                poster_id: poster_id.to_owned(),
                edition_id: edition_id.to_owned(),
            })?;

        Ok(ResolvedItem {
            poster,
            edition: Some(edition),
        })
    }

    /// All posters, in catalogue order.
    #[must_use]
    pub fn posters(&self) -> &[Poster] {
        &self.posters
    }

    /// Number of posters in the catalogue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.posters.len()
    }

    /// Whether the catalogue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posters.is_empty()
    }
}
