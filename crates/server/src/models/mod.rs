//! Domain models for the storefront backend.
//!
//! These are validated domain objects, independent of any particular
//! storage backend. The Postgres store maps them to/from row types; the
//! in-memory store holds them directly.

pub mod category;
pub mod engagement;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use category::Category;
pub use engagement::{ContactMessage, Subscriber};
pub use order::{Address, Order, OrderItem, Payment, Pricing, ShippingInfo};
pub use product::{Product, ProductImage, Rating, Sales, Stock};
pub use review::Review;
pub use user::User;
