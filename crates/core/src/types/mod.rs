//! Core types for the Souq storefront.
//!
//! Type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use slug::slugify;
pub use status::*;
