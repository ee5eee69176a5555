//! Storage layer.
//!
//! Persistence sits behind async repository traits with two backends:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, the production backend
//! - [`MemoryStore`] - in-memory maps, for tests and local development
//!
//! The traits expose a few *composite* operations ([`OrderStore::insert_order`],
//! [`OrderStore::update_order`], [`ReviewStore::insert_review`]) rather than
//! raw row writes, because the order workflow and the review aggregate need
//! multi-entity atomicity: stock reservation and order insert commit together
//! or not at all, and a review write and its product's rating recompute are a
//! single unit.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use souq_core::{
    CategoryId, ContactMessageId, ContactStatus, Email, OrderId, OrderStatus, ProductId, ReviewId,
    SubscriberId, SubscriberStatus, UserId,
};

use crate::models::{
    Category, ContactMessage, Order, Product, Rating, Review, Subscriber, User,
};

/// Storage-layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row targeted by an update no longer exists.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A conditional stock decrement was rejected: the product's tracked
    /// quantity is below the requested amount.
    #[error("insufficient stock for product {product_id} (available: {available})")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
    },

    /// Stored data failed to deserialize into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Pagination window. `page` is 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    /// Maximum page size accepted from clients.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a page from raw query parameters, clamping to sane bounds.
    #[must_use]
    pub fn clamped(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Row offset for this window.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// Row limit for this window.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page as i64
    }

    /// Total number of pages for `total` rows.
    #[must_use]
    pub const fn pages(self, total: i64) -> i64 {
        let per = self.per_page as i64;
        (total + per - 1) / per
    }
}

/// Sort orders for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popular,
}

/// Filter for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Free-text search, delegated to the backend's text index.
    pub search: Option<String>,
    pub sort: ProductSort,
    /// Admin listings include inactive products.
    pub include_inactive: bool,
}

/// One product's share of an order: the quantity to reserve (or
/// restore) and the revenue attributed to it.
///
/// The quantity touches `stock_quantity` only for products that track
/// inventory; sales counters move either way.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: i64,
    pub revenue: Decimal,
}

/// Optional [start, end] bounds on `created_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Whether `at` falls inside this range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// Revenue and order count grouped by status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRevenue {
    pub status: OrderStatus,
    pub revenue: Decimal,
    pub count: i64,
}

/// Revenue for a single day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
}

/// Categories and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_category(&self, category: Category) -> StoreResult<Category>;
    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>>;
    /// All categories ordered by sort key, then name.
    async fn categories(&self, only_active: bool) -> StoreResult<Vec<Category>>;
    async fn update_category(&self, category: Category) -> StoreResult<Category>;
    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool>;

    async fn insert_product(&self, product: Product) -> StoreResult<Product>;
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    /// Filtered page of products plus the total matching count.
    async fn products(&self, filter: &ProductFilter, page: Page)
    -> StoreResult<(Vec<Product>, i64)>;
    async fn update_product(&self, product: Product) -> StoreResult<Product>;
    async fn delete_product(&self, id: ProductId) -> StoreResult<bool>;
}

/// Users and their auth sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &Email) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;

    async fn insert_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Resolve a bearer token to its user, ignoring expired sessions.
    async fn session_user(&self, token: &str) -> StoreResult<Option<UserId>>;
    async fn delete_session(&self, token: &str) -> StoreResult<()>;
}

/// Orders, including the composite operations the workflow needs.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically reserve stock and persist the order.
    ///
    /// For each reservation: `stock_quantity -= quantity` only where
    /// `stock_quantity >= quantity` (and the product tracks inventory),
    /// plus `sales_count += quantity` and `sales_revenue += revenue`.
    /// Any rejected reservation aborts the whole operation with
    /// [`StoreError::InsufficientStock`] and nothing is persisted.
    async fn insert_order(
        &self,
        order: Order,
        reservations: &[StockAdjustment],
    ) -> StoreResult<Order>;

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    /// Newest-first page of orders, optionally restricted to one user.
    async fn orders(&self, user: Option<UserId>, page: Page) -> StoreResult<(Vec<Order>, i64)>;

    /// Atomically write back an order and apply stock restocks (the
    /// inverse of the reservations made at placement). `restock` is
    /// empty for plain status updates.
    async fn update_order(&self, order: Order, restock: &[StockAdjustment])
    -> StoreResult<Order>;

    /// Whether `order_id` belongs to `user_id`, is delivered, and
    /// contains `product_id` (the verified-purchase check).
    async fn delivered_order_contains(
        &self,
        user_id: UserId,
        order_id: OrderId,
        product_id: ProductId,
    ) -> StoreResult<bool>;
}

/// Reviews; writes recompute the product's rating aggregate in the same
/// atomic operation.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert a review and recompute the product aggregate. Fails with
    /// [`StoreError::Conflict`] if the (user, product) pair already has
    /// a review.
    async fn insert_review(&self, review: Review) -> StoreResult<Review>;

    async fn review(&self, id: ReviewId) -> StoreResult<Option<Review>>;
    async fn reviews_for_product(
        &self,
        product_id: ProductId,
        approved_only: bool,
        page: Page,
    ) -> StoreResult<(Vec<Review>, i64)>;

    /// Write back a review (helpful toggle, approval change) and
    /// recompute the product aggregate.
    async fn update_review(&self, review: Review) -> StoreResult<Review>;
}

/// Newsletter subscribers and contact messages.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn insert_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber>;
    async fn subscriber(&self, id: SubscriberId) -> StoreResult<Option<Subscriber>>;
    async fn subscriber_by_email(&self, email: &Email) -> StoreResult<Option<Subscriber>>;
    async fn update_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber>;
    async fn subscribers(
        &self,
        status: Option<SubscriberStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Subscriber>, i64)>;
    async fn delete_subscriber(&self, id: SubscriberId) -> StoreResult<bool>;

    async fn insert_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage>;
    async fn contact(&self, id: ContactMessageId) -> StoreResult<Option<ContactMessage>>;
    async fn contacts(
        &self,
        status: Option<ContactStatus>,
        page: Page,
    ) -> StoreResult<(Vec<ContactMessage>, i64)>;
    async fn update_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage>;
    async fn delete_contact(&self, id: ContactMessageId) -> StoreResult<bool>;
}

/// Read-only aggregates for the dashboard and public stats.
///
/// Each method is an independent query; callers fan them out
/// concurrently.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Revenue over non-cancelled orders in the range.
    async fn total_revenue(&self, range: DateRange) -> StoreResult<Decimal>;
    /// Order count in the range, optionally by status; cancelled orders
    /// are excluded only when `exclude_cancelled` is set.
    async fn count_orders(
        &self,
        range: DateRange,
        status: Option<OrderStatus>,
        exclude_cancelled: bool,
    ) -> StoreResult<i64>;
    async fn count_products(&self, active_only: bool) -> StoreResult<i64>;
    async fn count_featured_products(&self) -> StoreResult<i64>;
    async fn count_categories(&self) -> StoreResult<i64>;
    /// Tracked products at or below their low-stock threshold.
    async fn count_low_stock(&self) -> StoreResult<i64>;
    async fn count_users(&self, since: Option<DateTime<Utc>>) -> StoreResult<i64>;
    async fn revenue_by_status(&self, range: DateRange) -> StoreResult<Vec<StatusRevenue>>;
    /// Best sellers by sales count.
    async fn top_products(&self, limit: i64) -> StoreResult<Vec<Product>>;
    async fn recent_orders(&self, range: DateRange, limit: i64) -> StoreResult<Vec<Order>>;
    /// Non-cancelled revenue per day over the trailing `days` days,
    /// oldest first, with zero-revenue days included.
    async fn daily_revenue(&self, days: u32) -> StoreResult<Vec<DailyRevenue>>;
}

/// The full storage surface the application state carries.
pub trait Store:
    CatalogStore + IdentityStore + OrderStore + ReviewStore + EngagementStore + StatsStore
{
}

impl<T> Store for T where
    T: CatalogStore + IdentityStore + OrderStore + ReviewStore + EngagementStore + StatsStore
{
}

/// Recompute a product's rating aggregate from approved review ratings.
///
/// Mean of the given ratings; zeroes when there are none.
pub(crate) fn rating_from(ratings: &[u8]) -> Rating {
    if ratings.is_empty() {
        return Rating::default();
    }
    let sum: u64 = ratings.iter().map(|r| u64::from(*r)).sum();
    #[allow(clippy::cast_precision_loss)]
    Rating {
        average: sum as f64 / ratings.len() as f64,
        count: ratings.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_mean_over_approved() {
        let rating = rating_from(&[5, 3, 4]);
        assert!((rating.average - 4.0).abs() < f64::EPSILON);
        assert_eq!(rating.count, 3);
    }

    #[test]
    fn rating_zero_when_empty() {
        let rating = rating_from(&[]);
        assert!(rating.average.abs() < f64::EPSILON);
        assert_eq!(rating.count, 0);
    }

    #[test]
    fn page_clamps_inputs() {
        let page = Page::clamped(None, Some(1000), 12);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Page::MAX_PER_PAGE);
        assert_eq!(page.offset(), 0);

        let page = Page::clamped(Some(3), Some(10), 12);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.pages(25), 3);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::clamped(None, Some(10), 12);
        assert_eq!(page.pages(0), 0);
        assert_eq!(page.pages(1), 1);
        assert_eq!(page.pages(10), 1);
        assert_eq!(page.pages(11), 2);
    }
}
