//! `PostgreSQL` store backend.
//!
//! Runtime sqlx queries against the schema in `migrations/`. Row structs
//! mirror the tables and convert into the domain models, surfacing bad
//! stored data as [`StoreError::DataCorruption`] rather than panicking.
//! The composite order and review operations run inside transactions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use souq_core::{
    CategoryId, ContactMessageId, ContactStatus, Email, OrderId, OrderStatus, ProductId, ReviewId,
    SubscriberId, SubscriberStatus, UserId,
};

use crate::models::{
    Category, ContactMessage, Order, OrderItem, Payment, Pricing, Product, ProductImage, Rating,
    Review, Sales, ShippingInfo, Stock, Subscriber, User,
};

use super::{
    CatalogStore, DailyRevenue, DateRange, EngagementStore, IdentityStore, OrderStore, Page,
    ProductFilter, ProductSort, ReviewStore, StatsStore, StatusRevenue, StockAdjustment,
    StoreError, StoreResult,
};

/// Build a connection pool for the given database URL.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// `PostgreSQL`-backed [`super::Store`] implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Map unique-constraint violations to [`StoreError::Conflict`].
fn map_insert_err(err: sqlx::Error, conflict_message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(conflict_message.to_owned())
        }
        _ => StoreError::Database(err),
    }
}

fn parse_status<T: std::str::FromStr>(raw: &str, what: &str) -> StoreResult<T> {
    raw.parse()
        .map_err(|_| StoreError::DataCorruption(format!("unknown {what} '{raw}'")))
}

#[derive(FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    image: String,
    parent_id: Option<CategoryId>,
    is_active: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            image: row.image,
            parent_id: row.parent_id,
            is_active: row.is_active,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    short_description: Option<String>,
    price: Decimal,
    compare_price: Option<Decimal>,
    sku: String,
    category_id: CategoryId,
    images: serde_json::Value,
    stock_quantity: i64,
    track_inventory: bool,
    low_stock_threshold: i64,
    sales_count: i64,
    sales_revenue: Decimal,
    rating_average: f64,
    rating_count: i64,
    tags: Vec<String>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        let images: Vec<ProductImage> = serde_json::from_value(row.images)
            .map_err(|e| StoreError::DataCorruption(format!("product images: {e}")))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            short_description: row.short_description,
            price: row.price,
            compare_price: row.compare_price,
            sku: row.sku,
            category_id: row.category_id,
            images,
            stock: Stock {
                quantity: row.stock_quantity,
                track_inventory: row.track_inventory,
                low_stock_threshold: row.low_stock_threshold,
            },
            sales: Sales {
                count: row.sales_count,
                revenue: row.sales_revenue,
            },
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
            },
            tags: row.tags,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: Email,
    password_hash: Option<String>,
    google_id: Option<String>,
    phone: Option<String>,
    address: Option<serde_json::Value>,
    avatar: String,
    role: String,
    is_active: bool,
    wishlist: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            google_id: row.google_id,
            phone: row.phone,
            address: row.address,
            avatar: row.avatar,
            role: parse_status(&row.role, "role")?,
            is_active: row.is_active,
            wishlist: row.wishlist.into_iter().map(ProductId::from_uuid).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    items: serde_json::Value,
    shipping_address: serde_json::Value,
    billing_address: serde_json::Value,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    discount: Decimal,
    total: Decimal,
    payment_method: String,
    payment_status: String,
    transaction_id: Option<String>,
    status: String,
    tracking_number: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> StoreResult<Self> {
        let items: Vec<OrderItem> = serde_json::from_value(row.items)
            .map_err(|e| StoreError::DataCorruption(format!("order items: {e}")))?;
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            items,
            shipping_address: row.shipping_address,
            billing_address: row.billing_address,
            pricing: Pricing {
                subtotal: row.subtotal,
                shipping: row.shipping,
                tax: row.tax,
                discount: row.discount,
                total: row.total,
            },
            payment: Payment {
                method: parse_status(&row.payment_method, "payment method")?,
                status: parse_status(&row.payment_status, "payment status")?,
                transaction_id: row.transaction_id,
            },
            status: parse_status(&row.status, "order status")?,
            shipping: ShippingInfo {
                tracking_number: row.tracking_number,
                estimated_delivery: row.estimated_delivery,
                shipped_at: row.shipped_at,
                delivered_at: row.delivered_at,
            },
            cancelled_at: row.cancelled_at,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ReviewRow {
    id: ReviewId,
    user_id: UserId,
    product_id: ProductId,
    order_id: Option<OrderId>,
    rating: i16,
    title: String,
    comment: String,
    images: Vec<String>,
    is_verified: bool,
    is_approved: bool,
    helpful_users: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            order_id: row.order_id,
            rating: u8::try_from(row.rating)
                .map_err(|_| StoreError::DataCorruption(format!("rating {}", row.rating)))?,
            title: row.title,
            comment: row.comment,
            images: row.images,
            is_verified: row.is_verified,
            is_approved: row.is_approved,
            helpful_users: row
                .helpful_users
                .into_iter()
                .map(UserId::from_uuid)
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SubscriberRow {
    id: SubscriberId,
    email: Email,
    status: String,
    source: String,
    subscribed_at: DateTime<Utc>,
    unsubscribed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = StoreError;

    fn try_from(row: SubscriberRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            email: row.email,
            status: parse_status(&row.status, "subscriber status")?,
            source: parse_status(&row.source, "subscriber source")?,
            subscribed_at: row.subscribed_at,
            unsubscribed_at: row.unsubscribed_at,
        })
    }
}

#[derive(FromRow)]
struct ContactRow {
    id: ContactMessageId,
    name: String,
    email: Email,
    phone: Option<String>,
    message: String,
    status: String,
    is_read: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for ContactMessage {
    type Error = StoreError;

    fn try_from(row: ContactRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            message: row.message,
            status: parse_status(&row.status, "contact status")?,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Append the WHERE fragments for a product listing. The base query must
/// end in `WHERE TRUE` so every fragment can start with `AND`.
fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if !filter.include_inactive {
        builder.push(" AND is_active");
    }
    if let Some(category) = filter.category {
        builder.push(" AND category_id = ").push_bind(category);
    }
    if let Some(featured) = filter.featured {
        builder.push(" AND is_featured = ").push_bind(featured);
    }
    if let Some(min) = filter.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
    if let Some(search) = filter
        .search
        .as_ref()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
    {
        builder
            .push(" AND to_tsvector('simple', name || ' ' || description)")
            .push(" @@ plainto_tsquery('simple', ")
            .push_bind(search)
            .push(")");
    }
}

const fn product_order_by(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => " ORDER BY created_at DESC",
        ProductSort::PriceAsc => " ORDER BY price ASC",
        ProductSort::PriceDesc => " ORDER BY price DESC",
        ProductSort::Rating => " ORDER BY rating_average DESC",
        ProductSort::Popular => " ORDER BY sales_count DESC",
    }
}

/// Conditional stock reservation. Matches no row when the product is
/// gone or tracked stock is short, so callers check `rows_affected`.
const RESERVE_STOCK_SQL: &str = "UPDATE products SET \
     stock_quantity = CASE WHEN track_inventory THEN stock_quantity - $1 ELSE stock_quantity END, \
     sales_count = sales_count + $1, \
     sales_revenue = sales_revenue + $2, \
     updated_at = now() \
     WHERE id = $3 AND (NOT track_inventory OR stock_quantity >= $1)";

const RESTORE_STOCK_SQL: &str = "UPDATE products SET \
     stock_quantity = CASE WHEN track_inventory THEN stock_quantity + $1 ELSE stock_quantity END, \
     sales_count = GREATEST(sales_count - $1, 0), \
     sales_revenue = GREATEST(sales_revenue - $2, 0), \
     updated_at = now() \
     WHERE id = $3";

/// Recompute a product's rating columns from its approved reviews.
const RECOMPUTE_RATING_SQL: &str = "UPDATE products SET \
     rating_average = COALESCE((SELECT AVG(rating)::float8 FROM reviews \
         WHERE product_id = $1 AND is_approved), 0), \
     rating_count = (SELECT COUNT(*) FROM reviews \
         WHERE product_id = $1 AND is_approved), \
     updated_at = now() \
     WHERE id = $1";

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_category(&self, category: Category) -> StoreResult<Category> {
        sqlx::query(
            "INSERT INTO categories \
             (id, name, slug, description, image, parent_id, is_active, sort_order, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.parent_id)
        .bind(category.is_active)
        .bind(category.sort_order)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "category name or slug already exists"))?;
        Ok(category)
    }

    async fn category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn categories(&self, only_active: bool) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT * FROM categories WHERE (NOT $1 OR is_active) \
             ORDER BY sort_order, name",
        )
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let result = sqlx::query(
            "UPDATE categories SET name = $2, slug = $3, description = $4, image = $5, \
             parent_id = $6, is_active = $7, sort_order = $8, updated_at = $9 \
             WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.parent_id)
        .bind(category.is_active)
        .bind(category.sort_order)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "category name or slug already exists"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("category"));
        }
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_product(&self, product: Product) -> StoreResult<Product> {
        let images = serde_json::to_value(&product.images)
            .map_err(|e| StoreError::DataCorruption(format!("product images: {e}")))?;
        sqlx::query(
            "INSERT INTO products \
             (id, name, slug, description, short_description, price, compare_price, sku, \
              category_id, images, stock_quantity, track_inventory, low_stock_threshold, \
              sales_count, sales_revenue, rating_average, rating_count, tags, is_active, \
              is_featured, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, $18, $19, $20, $21, $22)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(images)
        .bind(product.stock.quantity)
        .bind(product.stock.track_inventory)
        .bind(product.stock.low_stock_threshold)
        .bind(product.sales.count)
        .bind(product.sales.revenue)
        .bind(product.rating.average)
        .bind(product.rating.count)
        .bind(&product.tags)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "product slug or sku already exists"))?;
        Ok(product)
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> StoreResult<(Vec<Product>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE TRUE");
        push_product_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut listing = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
        push_product_filters(&mut listing, filter);
        listing.push(product_order_by(filter.sort));
        listing.push(" LIMIT ").push_bind(page.limit());
        listing.push(" OFFSET ").push_bind(page.offset());
        let rows: Vec<ProductRow> = listing
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((products, total))
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let images = serde_json::to_value(&product.images)
            .map_err(|e| StoreError::DataCorruption(format!("product images: {e}")))?;
        let result = sqlx::query(
            "UPDATE products SET name = $2, slug = $3, description = $4, \
             short_description = $5, price = $6, compare_price = $7, sku = $8, \
             category_id = $9, images = $10, stock_quantity = $11, track_inventory = $12, \
             low_stock_threshold = $13, tags = $14, is_active = $15, is_featured = $16, \
             updated_at = $17 \
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.price)
        .bind(product.compare_price)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(images)
        .bind(product.stock.quantity)
        .bind(product.stock.track_inventory)
        .bind(product.stock.low_stock_threshold)
        .bind(&product.tags)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "product slug or sku already exists"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("product"));
        }
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let wishlist: Vec<Uuid> = user.wishlist.iter().map(ProductId::as_uuid).collect();
        sqlx::query(
            "INSERT INTO users \
             (id, name, email, password_hash, google_id, phone, address, avatar, role, \
              is_active, wishlist, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.avatar)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&wishlist)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "email already registered"))?;
        Ok(user)
    }

    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn user_by_email(&self, email: &Email) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let wishlist: Vec<Uuid> = user.wishlist.iter().map(ProductId::as_uuid).collect();
        let result = sqlx::query(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, google_id = $5, \
             phone = $6, address = $7, avatar = $8, role = $9, is_active = $10, \
             wishlist = $11, updated_at = $12 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.avatar)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&wishlist)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "email already registered"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(user)
    }

    async fn insert_session(
        &self,
        token: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session_user(&self, token: &str) -> StoreResult<Option<UserId>> {
        let user_id: Option<UserId> = sqlx::query_scalar(
            "SELECT user_id FROM sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(
        &self,
        order: Order,
        reservations: &[StockAdjustment],
    ) -> StoreResult<Order> {
        let items = serde_json::to_value(&order.items)
            .map_err(|e| StoreError::DataCorruption(format!("order items: {e}")))?;
        let mut tx = self.pool.begin().await?;

        for adj in reservations {
            let result = sqlx::query(RESERVE_STOCK_SQL)
                .bind(adj.quantity)
                .bind(adj.revenue)
                .bind(adj.product_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                        .bind(adj.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;
                return Err(available.map_or(StoreError::NotFound("product"), |available| {
                    StoreError::InsufficientStock {
                        product_id: adj.product_id,
                        available,
                    }
                }));
            }
        }

        sqlx::query(
            "INSERT INTO orders \
             (id, order_number, user_id, items, shipping_address, billing_address, subtotal, \
              shipping, tax, discount, total, payment_method, payment_status, transaction_id, \
              status, tracking_number, estimated_delivery, shipped_at, delivered_at, \
              cancelled_at, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, $18, $19, $20, $21, $22, $23)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(items)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.pricing.subtotal)
        .bind(order.pricing.shipping)
        .bind(order.pricing.tax)
        .bind(order.pricing.discount)
        .bind(order.pricing.total)
        .bind(order.payment.method.as_str())
        .bind(order.payment.status.as_str())
        .bind(&order.payment.transaction_id)
        .bind(order.status.as_str())
        .bind(&order.shipping.tracking_number)
        .bind(order.shipping.estimated_delivery)
        .bind(order.shipping.shipped_at)
        .bind(order.shipping.delivered_at)
        .bind(order.cancelled_at)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_err(e, "order number already exists"))?;

        tx.commit().await?;
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders(&self, user: Option<UserId>, page: Page) -> StoreResult<(Vec<Order>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR user_id = $1)")
                .bind(user)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((orders, total))
    }

    async fn update_order(
        &self,
        order: Order,
        restock: &[StockAdjustment],
    ) -> StoreResult<Order> {
        let items = serde_json::to_value(&order.items)
            .map_err(|e| StoreError::DataCorruption(format!("order items: {e}")))?;
        let mut tx = self.pool.begin().await?;

        for adj in restock {
            sqlx::query(RESTORE_STOCK_SQL)
                .bind(adj.quantity)
                .bind(adj.revenue)
                .bind(adj.product_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query(
            "UPDATE orders SET items = $2, shipping_address = $3, billing_address = $4, \
             subtotal = $5, shipping = $6, tax = $7, discount = $8, total = $9, \
             payment_method = $10, payment_status = $11, transaction_id = $12, status = $13, \
             tracking_number = $14, estimated_delivery = $15, shipped_at = $16, \
             delivered_at = $17, cancelled_at = $18, notes = $19, updated_at = $20 \
             WHERE id = $1",
        )
        .bind(order.id)
        .bind(items)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.pricing.subtotal)
        .bind(order.pricing.shipping)
        .bind(order.pricing.tax)
        .bind(order.pricing.discount)
        .bind(order.pricing.total)
        .bind(order.payment.method.as_str())
        .bind(order.payment.status.as_str())
        .bind(&order.payment.transaction_id)
        .bind(order.status.as_str())
        .bind(&order.shipping.tracking_number)
        .bind(order.shipping.estimated_delivery)
        .bind(order.shipping.shipped_at)
        .bind(order.shipping.delivered_at)
        .bind(order.cancelled_at)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound("order"));
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn delivered_order_contains(
        &self,
        user_id: UserId,
        order_id: OrderId,
        product_id: ProductId,
    ) -> StoreResult<bool> {
        // Items are JSONB; match on the embedded product_id string.
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM orders \
             WHERE id = $1 AND user_id = $2 AND status = 'delivered' \
             AND items @> $3::jsonb",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(serde_json::json!([{ "product_id": product_id }]))
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_review(&self, review: Review) -> StoreResult<Review> {
        let mut tx = self.pool.begin().await?;
        let helpful: Vec<Uuid> = review.helpful_users.iter().map(UserId::as_uuid).collect();
        sqlx::query(
            "INSERT INTO reviews \
             (id, user_id, product_id, order_id, rating, title, comment, images, \
              is_verified, is_approved, helpful_users, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.product_id)
        .bind(review.order_id)
        .bind(i16::from(review.rating))
        .bind(&review.title)
        .bind(&review.comment)
        .bind(&review.images)
        .bind(review.is_verified)
        .bind(review.is_approved)
        .bind(&helpful)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_err(e, "product already reviewed by this user"))?;

        sqlx::query(RECOMPUTE_RATING_SQL)
            .bind(review.product_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(review)
    }

    async fn review(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Review::try_from).transpose()
    }

    async fn reviews_for_product(
        &self,
        product_id: ProductId,
        approved_only: bool,
        page: Page,
    ) -> StoreResult<(Vec<Review>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews \
             WHERE product_id = $1 AND (NOT $2 OR is_approved)",
        )
        .bind(product_id)
        .bind(approved_only)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT * FROM reviews WHERE product_id = $1 AND (NOT $2 OR is_approved) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(product_id)
        .bind(approved_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let reviews = rows
            .into_iter()
            .map(Review::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((reviews, total))
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        let mut tx = self.pool.begin().await?;
        let helpful: Vec<Uuid> = review.helpful_users.iter().map(UserId::as_uuid).collect();
        let result = sqlx::query(
            "UPDATE reviews SET rating = $2, title = $3, comment = $4, images = $5, \
             is_verified = $6, is_approved = $7, helpful_users = $8, updated_at = $9 \
             WHERE id = $1",
        )
        .bind(review.id)
        .bind(i16::from(review.rating))
        .bind(&review.title)
        .bind(&review.comment)
        .bind(&review.images)
        .bind(review.is_verified)
        .bind(review.is_approved)
        .bind(&helpful)
        .bind(review.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound("review"));
        }

        sqlx::query(RECOMPUTE_RATING_SQL)
            .bind(review.product_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(review)
    }
}

#[async_trait]
impl EngagementStore for PgStore {
    async fn insert_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        sqlx::query(
            "INSERT INTO subscribers (id, email, status, source, subscribed_at, unsubscribed_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(subscriber.id)
        .bind(subscriber.email.as_str())
        .bind(subscriber.status.as_str())
        .bind(subscriber.source.as_str())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.unsubscribed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "email already subscribed"))?;
        Ok(subscriber)
    }

    async fn subscriber(&self, id: SubscriberId) -> StoreResult<Option<Subscriber>> {
        let row = sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Subscriber::try_from).transpose()
    }

    async fn subscriber_by_email(&self, email: &Email) -> StoreResult<Option<Subscriber>> {
        let row =
            sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Subscriber::try_from).transpose()
    }

    async fn update_subscriber(&self, subscriber: Subscriber) -> StoreResult<Subscriber> {
        let result = sqlx::query(
            "UPDATE subscribers SET status = $2, source = $3, subscribed_at = $4, \
             unsubscribed_at = $5 WHERE id = $1",
        )
        .bind(subscriber.id)
        .bind(subscriber.status.as_str())
        .bind(subscriber.source.as_str())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.unsubscribed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("subscriber"));
        }
        Ok(subscriber)
    }

    async fn subscribers(
        &self,
        status: Option<SubscriberStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Subscriber>, i64)> {
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscribers WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, SubscriberRow>(
            "SELECT * FROM subscribers WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY subscribed_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let subscribers = rows
            .into_iter()
            .map(Subscriber::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((subscribers, total))
    }

    async fn delete_subscriber(&self, id: SubscriberId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM subscribers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage> {
        sqlx::query(
            "INSERT INTO contact_messages \
             (id, name, email, phone, message, status, is_read, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(message.id)
        .bind(&message.name)
        .bind(message.email.as_str())
        .bind(&message.phone)
        .bind(&message.message)
        .bind(message.status.as_str())
        .bind(message.is_read)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(message)
    }

    async fn contact(&self, id: ContactMessageId) -> StoreResult<Option<ContactMessage>> {
        let row =
            sqlx::query_as::<_, ContactRow>("SELECT * FROM contact_messages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ContactMessage::try_from).transpose()
    }

    async fn contacts(
        &self,
        status: Option<ContactStatus>,
        page: Page,
    ) -> StoreResult<(Vec<ContactMessage>, i64)> {
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contact_messages WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, ContactRow>(
            "SELECT * FROM contact_messages WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let messages = rows
            .into_iter()
            .map(ContactMessage::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((messages, total))
    }

    async fn update_contact(&self, message: ContactMessage) -> StoreResult<ContactMessage> {
        let result = sqlx::query(
            "UPDATE contact_messages SET status = $2, is_read = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(message.id)
        .bind(message.status.as_str())
        .bind(message.is_read)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("contact message"));
        }
        Ok(message)
    }

    async fn delete_contact(&self, id: ContactMessageId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StatsStore for PgStore {
    async fn total_revenue(&self, range: DateRange) -> StoreResult<Decimal> {
        let revenue: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM orders \
             WHERE status <> 'cancelled' \
             AND ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2)",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(revenue)
    }

    async fn count_orders(
        &self,
        range: DateRange,
        status: Option<OrderStatus>,
        exclude_cancelled: bool,
    ) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2) \
             AND ($3::text IS NULL OR status = $3) \
             AND (NOT $4 OR status <> 'cancelled')",
        )
        .bind(range.start)
        .bind(range.end)
        .bind(status.map(|s| s.as_str()))
        .bind(exclude_cancelled)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_products(&self, active_only: bool) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE (NOT $1 OR is_active)")
                .bind(active_only)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_featured_products(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE is_featured AND is_active",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_categories(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_low_stock(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products \
             WHERE track_inventory AND stock_quantity <= low_stock_threshold",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_users(&self, since: Option<DateTime<Utc>>) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::timestamptz IS NULL OR created_at >= $1)",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn revenue_by_status(&self, range: DateRange) -> StoreResult<Vec<StatusRevenue>> {
        let rows: Vec<(String, Decimal, i64)> = sqlx::query_as(
            "SELECT status, COALESCE(SUM(total), 0), COUNT(*) FROM orders \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2) \
             GROUP BY status ORDER BY status",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(status, revenue, count)| {
                Ok(StatusRevenue {
                    status: parse_status(&status, "order status")?,
                    revenue,
                    count,
                })
            })
            .collect()
    }

    async fn top_products(&self, limit: i64) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products ORDER BY sales_count DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn recent_orders(&self, range: DateRange, limit: i64) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2) \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn daily_revenue(&self, days: u32) -> StoreResult<Vec<DailyRevenue>> {
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            "SELECT d::date, COALESCE(SUM(o.total), 0) \
             FROM generate_series(CURRENT_DATE - ($1::int - 1), CURRENT_DATE, '1 day') AS d \
             LEFT JOIN orders o \
               ON o.created_at::date = d::date AND o.status <> 'cancelled' \
             GROUP BY d ORDER BY d",
        )
        .bind(i32::try_from(days).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(date, revenue)| DailyRevenue { date, revenue })
            .collect())
    }
}
