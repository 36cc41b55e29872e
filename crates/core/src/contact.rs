//! Checkout contact validation.
//!
//! Shipping details are collected by the checkout form, persisted
//! best-effort between attempts, and validated here before they reach
//! the payment provider.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::email::Email;

/// Countries the shop ships to, in the order the payment provider
/// receives them.
pub const ALLOWED_COUNTRIES: [&str; 2] = ["US", "CA"];

static US_POSTAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("Invalid US postal regex"));

// Matched after whitespace is stripped, so only the optional hyphen
// separator survives.
static CA_POSTAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]\d[A-Z]-?\d[A-Z]\d$").expect("Invalid CA postal regex"));

/// Validation errors for a checkout contact.
///
/// Messages are the user-facing strings the checkout form shows
/// verbatim. Validation short-circuits on the first failure, in the
/// order the variants are declared.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// A required field is blank after trimming.
    #[error("Enter your shipping address before checking out.")]
    MissingField {
        /// The first blank field, in camelCase as the form names it.
        field: &'static str,
    },
    /// The country is not one the shop ships to.
    #[error("Select a supported shipping country before checking out.")]
    UnsupportedCountry,
    /// The email address is not `local@domain.tld`-shaped.
    #[error("Enter a valid email address before checking out.")]
    InvalidEmail,
    /// The US ZIP code is not `12345` or `12345-6789`.
    #[error("Enter a valid US ZIP code before checking out.")]
    InvalidUsPostalCode,
    /// The Canadian postal code is not `A1A 1A1`-shaped.
    #[error("Enter a valid Canadian postal code before checking out.")]
    InvalidCaPostalCode,
}

/// Raw checkout contact details as submitted by the client.
///
/// Fields are untrimmed and unvalidated; [`validate`] produces the
/// normalised [`ValidatedContact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutContact {
    /// Full name as it should appear on the shipment.
    pub name: String,
    /// Email address for the receipt.
    pub email: String,
    /// Street address.
    pub address_line1: String,
    /// Apartment, suite, unit.
    pub address_line2: Option<String>,
    /// City or town.
    pub city: String,
    /// State or province.
    pub region: String,
    /// ZIP or postal code.
    pub postal_code: String,
    /// Two-letter country code.
    pub country: String,
}

impl Default for CheckoutContact {
    /// The checkout form's initial state: empty fields with the
    /// country preset to `US`.
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            address_line1: String::new(),
            address_line2: None,
            city: String::new(),
            region: String::new(),
            postal_code: String::new(),
            country: "US".to_owned(),
        }
    }
}

/// A contact that passed validation.
///
/// All fields are normalised: trimmed, email lower-cased, country
/// upper-cased, postal code stripped of whitespace (and upper-cased
/// for Canada).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedContact {
    /// Full name as it should appear on the shipment.
    pub name: String,
    /// Validated email address.
    pub email: Email,
    /// Street address.
    pub address_line1: String,
    /// Apartment, suite, unit; `None` when blank.
    pub address_line2: Option<String>,
    /// City or town.
    pub city: String,
    /// State or province.
    pub region: String,
    /// Normalised ZIP or postal code.
    pub postal_code: String,
    /// Upper-cased two-letter country code.
    pub country: String,
}

impl ValidatedContact {
    /// The shipping address in the payment provider's parameter shape.
    #[must_use]
    pub fn provider_address(&self) -> ProviderAddress {
        ProviderAddress {
            line1: self.address_line1.clone(),
            line2: self.address_line2.clone(),
            city: self.city.clone(),
            state: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

/// A shipping address keyed the way the payment provider expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAddress {
    /// Street address.
    pub line1: String,
    /// Apartment, suite, unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City or town.
    pub city: String,
    /// State or province.
    pub state: String,
    /// Normalised postal code.
    pub postal_code: String,
    /// Upper-cased two-letter country code.
    pub country: String,
}

/// Validates and normalises a checkout contact.
///
/// Checks run in order: required fields, country allow-list, email
/// shape, country-specific postal code. The first failure wins.
///
/// # Errors
///
/// Returns the first [`ContactError`] encountered.
pub fn validate(contact: &CheckoutContact) -> Result<ValidatedContact, ContactError> {
    let name = contact.name.trim();
    let email = contact.email.trim().to_lowercase();
    let address_line1 = contact.address_line1.trim();
    let address_line2 = contact
        .address_line2
        .as_deref()
        .map(str::trim)
        .filter(|line2| !line2.is_empty())
        .map(str::to_owned);
    let city = contact.city.trim();
    let region = contact.region.trim();
    let postal_code = contact.postal_code.trim();
    let country = contact.country.trim().to_uppercase();

    let required: [(&str, &str); 7] = [
        ("name", name),
        ("email", &email),
        ("addressLine1", address_line1),
        ("city", city),
        ("region", region),
        ("postalCode", postal_code),
        ("country", &country),
    ];
    for (field, value) in required {
        if value.is_empty() {
            return Err(ContactError::MissingField { field });
        }
    }

    if !ALLOWED_COUNTRIES.contains(&country.as_str()) {
        return Err(ContactError::UnsupportedCountry);
    }

    let email = Email::parse(&email).map_err(|_| ContactError::InvalidEmail)?;

    let mut postal_code: String = postal_code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if country == "US" && !US_POSTAL_PATTERN.is_match(&postal_code) {
        return Err(ContactError::InvalidUsPostalCode);
    }
    if country == "CA" {
        postal_code = postal_code.to_uppercase();
        if !CA_POSTAL_PATTERN.is_match(&postal_code) {
            return Err(ContactError::InvalidCaPostalCode);
        }
    }

    Ok(ValidatedContact {
        name: name.to_owned(),
        email,
        address_line1: address_line1.to_owned(),
        address_line2,
        city: city.to_owned(),
        region: region.to_owned(),
        postal_code,
        country,
    })
}
