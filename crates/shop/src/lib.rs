//! Atelier Shop library.
//!
//! This crate provides the shop server as a library, allowing the
//! router to be driven in-process by the integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session_cart;
pub mod state;
pub mod stripe;
