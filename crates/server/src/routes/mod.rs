//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Health check
//! GET  /api/stats                       - Public store counts
//!
//! # Auth
//! POST /api/auth/register               - Create account
//! POST /api/auth/login                  - Login
//! POST /api/auth/logout                 - Logout (auth)
//! GET  /api/auth/me                     - Current user (auth)
//! PUT  /api/auth/profile                - Update profile (auth)
//! PUT  /api/auth/password               - Change password (auth)
//!
//! # Catalog
//! GET  /api/categories                  - Category listing
//! GET  /api/categories/{id}             - Category detail
//! POST /api/categories                  - Create category (admin)
//! PUT  /api/categories/{id}             - Update category (admin)
//! DELETE /api/categories/{id}           - Delete category (admin)
//! GET  /api/products                    - Product listing (filter/sort/page)
//! GET  /api/products/featured           - Featured products
//! GET  /api/products/{id}               - Product detail with recent reviews
//! GET  /api/products/{id}/reviews       - Approved reviews for a product
//! POST /api/products                    - Create product (admin)
//! PUT  /api/products/{id}               - Update product (admin)
//! PUT  /api/products/{id}/featured      - Toggle featured flag (admin)
//! DELETE /api/products/{id}             - Delete product (admin)
//!
//! # Orders
//! POST /api/orders                      - Place order (auth)
//! GET  /api/orders                      - Own orders (auth)
//! GET  /api/orders/all                  - All orders (admin)
//! GET  /api/orders/{id}                 - Order detail (owner or admin)
//! PUT  /api/orders/{id}/status          - Transition status (admin)
//! PUT  /api/orders/{id}/cancel          - Cancel own order (auth)
//!
//! # Reviews
//! GET  /api/reviews?product_id=         - Approved reviews for a product
//! POST /api/reviews                     - Create review (auth)
//! PUT  /api/reviews/{id}/helpful        - Toggle helpful vote (auth)
//! PUT  /api/reviews/{id}/approval       - Approve/unapprove (admin)
//!
//! # Wishlist (auth)
//! GET  /api/wishlist                    - List wishlist products
//! POST /api/wishlist/{product_id}       - Add product
//! DELETE /api/wishlist/{product_id}     - Remove product
//! DELETE /api/wishlist                  - Clear wishlist
//!
//! # Newsletter
//! POST /api/newsletter/subscribe        - Subscribe
//! POST /api/newsletter/unsubscribe      - Unsubscribe
//! GET  /api/newsletter/subscribers      - List subscribers (admin)
//! PUT  /api/newsletter/subscribers/{id}/status - Update status (admin)
//! DELETE /api/newsletter/subscribers/{id} - Delete subscriber (admin)
//!
//! # Contact
//! POST /api/contact                     - Submit message
//! GET  /api/contact                     - List messages (admin)
//! GET  /api/contact/{id}                - Message detail, marks read (admin)
//! PUT  /api/contact/{id}/status         - Update status (admin)
//! DELETE /api/contact/{id}              - Delete message (admin)
//!
//! # Dashboard
//! GET  /api/dashboard/stats             - Aggregated admin dashboard (admin)
//! ```

pub mod auth;
pub mod categories;
pub mod contact;
pub mod dashboard;
pub mod newsletter;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod wishlist;

use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::store::Page;

/// Default page size for listings.
const DEFAULT_PAGE_SIZE: u32 = 12;

/// Common pagination query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn to_page(&self) -> Page {
        Page::clamped(self.page, self.limit, DEFAULT_PAGE_SIZE)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/password", put(auth::change_password))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route(
            "/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::remove),
        )
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/featured", get(products::featured))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::remove),
        )
        .route("/{id}/featured", put(products::toggle_featured))
        .route("/{id}/reviews", get(reviews::list_for_product))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/all", get(orders::all))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/cancel", put(orders::cancel))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::index).post(reviews::create))
        .route("/{id}/helpful", put(reviews::toggle_helpful))
        .route("/{id}/approval", put(reviews::set_approval))
}

fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index).delete(wishlist::clear))
        .route(
            "/{product_id}",
            post(wishlist::add).delete(wishlist::remove),
        )
}

fn newsletter_routes() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(newsletter::subscribe))
        .route("/unsubscribe", post(newsletter::unsubscribe))
        .route("/subscribers", get(newsletter::subscribers))
        .route("/subscribers/{id}", delete(newsletter::remove_subscriber))
        .route(
            "/subscribers/{id}/status",
            put(newsletter::update_subscriber_status),
        )
}

fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(contact::create).get(contact::index))
        .route("/{id}", get(contact::show).delete(contact::remove))
        .route("/{id}/status", put(contact::update_status))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(dashboard::public_stats))
        .nest("/api/auth", auth_routes())
        .nest("/api/categories", category_routes())
        .nest("/api/products", product_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/reviews", review_routes())
        .nest("/api/wishlist", wishlist_routes())
        .nest("/api/newsletter", newsletter_routes())
        .nest("/api/contact", contact_routes())
        .route("/api/dashboard/stats", get(dashboard::stats))
}
