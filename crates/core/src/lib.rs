//! Souq Core - Shared types library.
//!
//! This crate provides the domain vocabulary used across the Souq
//! storefront backend:
//!
//! - [`types::id`] - UUID-backed newtype IDs for type-safe entity references
//! - [`types::email`] - Normalized, validated email addresses
//! - [`types::slug`] - URL-slug derivation for products and categories
//! - [`types::status`] - Lifecycle enums (orders, payments, roles, ...)
//!
//! The crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Database support (sqlx `Type`/`Encode`/`Decode` impls)
//! is gated behind the `postgres` feature.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
