//! In-memory store backend.
//!
//! One `RwLock` over the whole state gives the same all-or-nothing
//! behaviour the Postgres backend gets from transactions. Used by the
//! test suites and handy for running the server without a database.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use souq_core::{
    CategoryId, ContactMessageId, ContactStatus, Email, OrderId, OrderStatus, ProductId, ReviewId,
    SubscriberId, SubscriberStatus, UserId,
};

use crate::models::{Category, ContactMessage, Order, Product, Review, Subscriber, User};

use super::{
    CatalogStore, DailyRevenue, DateRange, EngagementStore, IdentityStore, OrderStore, Page,
    ProductFilter, ProductSort, ReviewStore, StatsStore, StatusRevenue, StockAdjustment,
    StoreError, StoreResult, rating_from,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    sessions: HashMap<String, (UserId, DateTime<Utc>)>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    reviews: HashMap<ReviewId, Review>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    contacts: HashMap<ContactMessageId, ContactMessage>,
}

/// In-memory [`super::Store`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        // Lock poisoning only happens after a panic elsewhere; propagate it.
        #[allow(clippy::unwrap_used)]
        self.state.read().unwrap()
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        #[allow(clippy::unwrap_used)]
        self.state.write().unwrap()
    }
}

fn paginate<T: Clone>(items: &[T], page: Page) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let out = items
        .iter()
        .skip(usize::try_from(page.offset()).unwrap_or(0))
        .take(usize::try_from(page.limit()).unwrap_or(0))
        .cloned()
        .collect();
    (out, total)
}

/// Apply stock reservations inside a held write lock. Verifies every
/// decrement before mutating anything so a late failure cannot leave a
/// partial write behind.
fn reserve_stock(state: &mut State, reservations: &[StockAdjustment]) -> StoreResult<()> {
    for adj in reservations {
        let product = state
            .products
            .get(&adj.product_id)
            .ok_or(StoreError::NotFound("product"))?;
        if product.stock.track_inventory && product.stock.quantity < adj.quantity {
            return Err(StoreError::InsufficientStock {
                product_id: adj.product_id,
                available: product.stock.quantity,
            });
        }
    }
    for adj in reservations {
        if let Some(product) = state.products.get_mut(&adj.product_id) {
            if product.stock.track_inventory {
                product.stock.quantity -= adj.quantity;
            }
            product.sales.count += adj.quantity;
            product.sales.revenue += adj.revenue;
            product.updated_at = Utc::now();
        }
    }
    Ok(())
}

fn restore_stock(state: &mut State, restock: &[StockAdjustment]) {
    for adj in restock {
        if let Some(product) = state.products.get_mut(&adj.product_id) {
            if product.stock.track_inventory {
                product.stock.quantity += adj.quantity;
            }
            product.sales.count = (product.sales.count - adj.quantity).max(0);
            product.sales.revenue = (product.sales.revenue - adj.revenue).max(Decimal::ZERO);
            product.updated_at = Utc::now();
        }
    }
}

/// Recompute one product's rating from its approved reviews. Call with
/// the write lock held so the review write and the aggregate stay
/// consistent.
fn recompute_rating(state: &mut State, product_id: ProductId) {
    let ratings: Vec<u8> = state
        .reviews
        .values()
        .filter(|r| r.product_id == product_id && r.is_approved)
        .map(|r| r.rating)
        .collect();
    if let Some(product) = state.products.get_mut(&product_id) {
        product.rating = rating_from(&ratings);
        product.updated_at = Utc::now();
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.write();
        if state.categories.values().any(|c| c.slug == category.slug) {
            return Err(StoreError::Conflict(format!(
                "category slug '{}' already exists",
                category.slug
            )));
        }
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self.read().categories.get(&id).cloned())
    }

    async fn categories(&self, only_active: bool) -> StoreResult<Vec<Category>> {
        let state = self.read();
        let mut out: Vec<Category> = state
            .categories
            .values()
            .filter(|c| !only_active || c.is_active)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(out)
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.write();
        if state
            .categories
            .values()
            .any(|c| c.id != category.id && c.slug == category.slug)
        {
            return Err(StoreError::Conflict(format!(
                "category slug '{}' already exists",
                category.slug
            )));
        }
        if !state.categories.contains_key(&category.id) {
            return Err(StoreError::NotFound("category"));
        }
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        let mut state = self.write();
        let removed = state.categories.remove(&id).is_some();
        if removed {
            // Mirrors the ON DELETE SET NULL on categories.parent_id.
            for child in state.categories.values_mut() {
                if child.parent_id == Some(id) {
                    child.parent_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn insert_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.write();
        if state.products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::Conflict(format!(
                "product slug '{}' already exists",
                product.slug
            )));
        }
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Conflict(format!(
                "product sku '{}' already exists",
                product.sku
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read().products.get(&id).cloned())
    }

    async fn products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> StoreResult<(Vec<Product>, i64)> {
        let state = self.read();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<Product> = state
            .products
            .values()
            .filter(|p| filter.include_inactive || p.is_active)
            .filter(|p| filter.category.is_none_or(|c| p.category_id == c))
            .filter(|p| filter.featured.is_none_or(|f| p.is_featured == f))
            .filter(|p| filter.min_price.is_none_or(|m| p.price >= m))
            .filter(|p| filter.max_price.is_none_or(|m| p.price <= m))
            .filter(|p| {
                needle.as_deref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        match filter.sort {
            ProductSort::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::PriceAsc => matched.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceDesc => matched.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Rating => matched.sort_by(|a, b| {
                b.rating
                    .average
                    .partial_cmp(&a.rating.average)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            ProductSort::Popular => matched.sort_by(|a, b| b.sales.count.cmp(&a.sales.count)),
        }
        Ok(paginate(&matched, page))
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.write();
        if state
            .products
            .values()
            .any(|p| p.id != product.id && p.slug == product.slug)
        {
            return Err(StoreError::Conflict(format!(
                "product slug '{}' already exists",
                product.slug
            )));
        }
        if !state.products.contains_key(&product.id) {
            return Err(StoreError::NotFound("product"));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<bool> {
        Ok(self.write().products.remove(&id).is_some())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.write();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.write();
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' already registered",
                user.email
            )));
        }
        if !state.users.contains_key(&user.id) {
            return Err(StoreError::NotFound("user"));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn insert_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.write()
            .sessions
            .insert(token.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<UserId>> {
        let state = self.read();
        Ok(state
            .sessions
            .get(token)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user_id, _)| *user_id))
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        self.write().sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(
        &self,
        order: Order,
        reservations: &[StockAdjustment],
    ) -> StoreResult<Order> {
        let mut state = self.write();
        reserve_stock(&mut state, reservations)?;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read().orders.get(&id).cloned())
    }

    async fn orders(&self, user: Option<UserId>, page: Page) -> StoreResult<(Vec<Order>, i64)> {
        let state = self.read();
        let mut matched: Vec<Order> = state
            .orders
            .values()
            .filter(|o| user.is_none_or(|u| o.user_id == u))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(&matched, page))
    }

    async fn update_order(
        &self,
        order: Order,
        restock: &[StockAdjustment],
    ) -> StoreResult<Order> {
        let mut state = self.write();
        if !state.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound("order"));
        }
        restore_stock(&mut state, restock);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn delivered_order_contains(
        &self,
        user_id: UserId,
        order_id: OrderId,
        product_id: ProductId,
    ) -> StoreResult<bool> {
        let state = self.read();
        Ok(state.orders.get(&order_id).is_some_and(|o| {
            o.user_id == user_id
                && o.status == OrderStatus::Delivered
                && o.contains_product(product_id)
        }))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review(&self, review: Review) -> StoreResult<Review> {
        let mut state = self.write();
        if state
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.product_id == review.product_id)
        {
            return Err(StoreError::Conflict(
                "product already reviewed by this user".to_owned(),
            ));
        }
        if !state.products.contains_key(&review.product_id) {
            return Err(StoreError::NotFound("product"));
        }
        let product_id = review.product_id;
        state.reviews.insert(review.id, review.clone());
        recompute_rating(&mut state, product_id);
        Ok(review)
    }

    async fn review(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        Ok(self.read().reviews.get(&id).cloned())
    }

    async fn reviews_for_product(
        &self,
        product_id: ProductId,
        approved_only: bool,
        page: Page,
    ) -> StoreResult<(Vec<Review>, i64)> {
        let state = self.read();
        let mut matched: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.product_id == product_id && (!approved_only || r.is_approved))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(&matched, page))
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        let mut state = self.write();
        if !state.reviews.contains_key(&review.id) {
            return Err(StoreError::NotFound("review"));
        }
        let product_id = review.product_id;
        state.reviews.insert(review.id, review.clone());
        recompute_rating(&mut state, product_id);
        Ok(review)
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn insert_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        let mut state = self.write();
        if state
            .subscribers
            .values()
            .any(|s| s.email == subscriber.email)
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' already subscribed",
                subscriber.email
            )));
        }
        state.subscribers.insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }

    async fn subscriber(&self, id: SubscriberId) -> StoreResult<Option<Subscriber>> {
        Ok(self.read().subscribers.get(&id).cloned())
    }

    async fn subscriber_by_email(&self, email: &Email) -> StoreResult<Option<Subscriber>> {
        Ok(self
            .read()
            .subscribers
            .values()
            .find(|s| &s.email == email)
            .cloned())
    }

    async fn update_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        let mut state = self.write();
        if !state.subscribers.contains_key(&subscriber.id) {
            return Err(StoreError::NotFound("subscriber"));
        }
        state.subscribers.insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }

    async fn subscribers(
        &self,
        status: Option<SubscriberStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Subscriber>, i64)> {
        let state = self.read();
        let mut matched: Vec<Subscriber> = state
            .subscribers
            .values()
            .filter(|s| status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.subscribed_at.cmp(&a.subscribed_at));
        Ok(paginate(&matched, page))
    }

    async fn delete_subscriber(&self, id: SubscriberId) -> StoreResult<bool> {
        Ok(self.write().subscribers.remove(&id).is_some())
    }

    async fn insert_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage> {
        self.write().contacts.insert(message.id, message.clone());
        Ok(message)
    }

    async fn contact(&self, id: ContactMessageId) -> StoreResult<Option<ContactMessage>> {
        Ok(self.read().contacts.get(&id).cloned())
    }

    async fn contacts(
        &self,
        status: Option<ContactStatus>,
        page: Page,
    ) -> StoreResult<(Vec<ContactMessage>, i64)> {
        let state = self.read();
        let mut matched: Vec<ContactMessage> = state
            .contacts
            .values()
            .filter(|m| status.is_none_or(|st| m.status == st))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(&matched, page))
    }

    async fn update_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage> {
        let mut state = self.write();
        if !state.contacts.contains_key(&message.id) {
            return Err(StoreError::NotFound("contact message"));
        }
        state.contacts.insert(message.id, message.clone());
        Ok(message)
    }

    async fn delete_contact(&self, id: ContactMessageId) -> StoreResult<bool> {
        Ok(self.write().contacts.remove(&id).is_some())
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn total_revenue(&self, range: DateRange) -> StoreResult<Decimal> {
        let state = self.read();
        Ok(state
            .orders
            .values()
            .filter(|o| o.status != OrderStatus::Cancelled && range.contains(o.created_at))
            .map(|o| o.pricing.total)
            .sum())
    }

    async fn count_orders(
        &self,
        range: DateRange,
        status: Option<OrderStatus>,
        exclude_cancelled: bool,
    ) -> StoreResult<i64> {
        let state = self.read();
        Ok(state
            .orders
            .values()
            .filter(|o| range.contains(o.created_at))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .filter(|o| !exclude_cancelled || o.status != OrderStatus::Cancelled)
            .count() as i64)
    }

    async fn count_products(&self, active_only: bool) -> StoreResult<i64> {
        let state = self.read();
        Ok(state
            .products
            .values()
            .filter(|p| !active_only || p.is_active)
            .count() as i64)
    }

    async fn count_featured_products(&self) -> StoreResult<i64> {
        let state = self.read();
        Ok(state
            .products
            .values()
            .filter(|p| p.is_featured && p.is_active)
            .count() as i64)
    }

    async fn count_categories(&self) -> StoreResult<i64> {
        Ok(self.read().categories.len() as i64)
    }

    async fn count_low_stock(&self) -> StoreResult<i64> {
        let state = self.read();
        Ok(state
            .products
            .values()
            .filter(|p| p.is_low_stock())
            .count() as i64)
    }

    async fn count_users(&self, since: Option<DateTime<Utc>>) -> StoreResult<i64> {
        let state = self.read();
        Ok(state
            .users
            .values()
            .filter(|u| since.is_none_or(|s| u.created_at >= s))
            .count() as i64)
    }

    async fn revenue_by_status(&self, range: DateRange) -> StoreResult<Vec<StatusRevenue>> {
        let state = self.read();
        let mut by_status: HashMap<OrderStatus, (Decimal, i64)> = HashMap::new();
        for order in state
            .orders
            .values()
            .filter(|o| range.contains(o.created_at))
        {
            let entry = by_status.entry(order.status).or_default();
            entry.0 += order.pricing.total;
            entry.1 += 1;
        }
        let mut out: Vec<StatusRevenue> = by_status
            .into_iter()
            .map(|(status, (revenue, count))| StatusRevenue {
                status,
                revenue,
                count,
            })
            .collect();
        out.sort_by_key(|s| s.status.as_str());
        Ok(out)
    }

    async fn top_products(&self, limit: i64) -> StoreResult<Vec<Product>> {
        let state = self.read();
        let mut out: Vec<Product> = state.products.values().cloned().collect();
        out.sort_by(|a, b| b.sales.count.cmp(&a.sales.count));
        out.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(out)
    }

    async fn recent_orders(&self, range: DateRange, limit: i64) -> StoreResult<Vec<Order>> {
        let state = self.read();
        let mut out: Vec<Order> = state
            .orders
            .values()
            .filter(|o| range.contains(o.created_at))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(out)
    }

    async fn daily_revenue(&self, days: u32) -> StoreResult<Vec<DailyRevenue>> {
        let state = self.read();
        let today = Utc::now().date_naive();
        let mut out = Vec::with_capacity(days as usize);
        for back in (0..i64::from(days)).rev() {
            let date = today - Duration::days(back);
            let revenue = state
                .orders
                .values()
                .filter(|o| {
                    o.status != OrderStatus::Cancelled && o.created_at.date_naive() == date
                })
                .map(|o| o.pricing.total)
                .sum();
            out.push(DailyRevenue { date, revenue });
        }
        Ok(out)
    }
}
