//! Atelier Core - Domain library for the Darby Mitchell poster shop.
//!
//! This crate implements the shop's pure domain logic, shared by the
//! `atelier-shop` HTTP server and its tests:
//! - [`catalog`] - The poster catalogue and (poster, edition) resolution
//! - [`cart`] - The cart engine: lines, order caps, and the priced view
//! - [`contact`] - Checkout contact normalisation and validation
//! - [`email`] - A validated email address newtype
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async. Session state and the payment provider live in
//! `atelier-shop`, layered on top of these types.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod contact;
pub mod email;

pub use cart::{AddOutcome, Cart, CartEntry, CartError, CartLine, PricedLine};
pub use catalog::{
    Catalog, CatalogError, Edition, InventoryStatus, Poster, ResolveError, ResolvedItem,
};
pub use contact::{
    ALLOWED_COUNTRIES, CheckoutContact, ContactError, ProviderAddress, ValidatedContact,
};
pub use email::{Email, EmailError};
