//! Category and product management.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use souq_core::{CategoryId, ProductId, slugify};

use crate::models::{Category, Product, ProductImage, Rating, Sales, Stock};
use crate::store::{Store, StoreError};

use super::{base36, random_base36};

/// Walking further up a category chain than this means the chain
/// loops.
const MAX_CATEGORY_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("category does not exist")]
    UnknownCategory,

    #[error("category cannot be its own ancestor")]
    CategoryCycle,

    #[error("category still has products")]
    CategoryInUse,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub image: String,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub sku: Option<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub stock: Stock,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Partial product update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Option<Decimal>>,
    pub category_id: Option<CategoryId>,
    pub images: Option<Vec<ProductImage>>,
    pub stock: Option<Stock>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_category(&self, input: CategoryInput) -> Result<Category, CatalogError> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is required".to_owned()));
        }
        if let Some(parent_id) = input.parent_id {
            self.store
                .category(parent_id)
                .await?
                .ok_or(CatalogError::UnknownCategory)?;
        }
        let slug = input
            .slug
            .as_deref()
            .and_then(slugify)
            .or_else(|| slugify(&name))
            .unwrap_or_else(|| fallback_slug("category"));
        let now = Utc::now();
        Ok(self
            .store
            .insert_category(Category {
                id: CategoryId::generate(),
                name,
                slug,
                description: input.description,
                image: input.image,
                parent_id: input.parent_id,
                is_active: input.is_active.unwrap_or(true),
                sort_order: input.sort_order,
                created_at: now,
                updated_at: now,
            })
            .await?)
    }

    pub async fn update_category(
        &self,
        id: CategoryId,
        input: CategoryInput,
    ) -> Result<Category, CatalogError> {
        let mut category = self
            .store
            .category(id)
            .await?
            .ok_or(CatalogError::NotFound("category"))?;

        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is required".to_owned()));
        }
        if let Some(parent_id) = input.parent_id {
            self.ensure_no_cycle(id, parent_id).await?;
        }

        category.name = name;
        if let Some(slug) = input.slug.as_deref().and_then(slugify) {
            category.slug = slug;
        }
        category.description = input.description;
        category.image = input.image;
        category.parent_id = input.parent_id;
        category.sort_order = input.sort_order;
        if let Some(is_active) = input.is_active {
            category.is_active = is_active;
        }
        category.updated_at = Utc::now();
        Ok(self.store.update_category(category).await?)
    }

    /// Refuse deletion while products still reference the category.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), CatalogError> {
        let filter = crate::store::ProductFilter {
            category: Some(id),
            include_inactive: true,
            ..Default::default()
        };
        let (_, total) = self
            .store
            .products(&filter, crate::store::Page::clamped(Some(1), Some(1), 1))
            .await?;
        if total > 0 {
            return Err(CatalogError::CategoryInUse);
        }
        if !self.store.delete_category(id).await? {
            return Err(CatalogError::NotFound("category"));
        }
        Ok(())
    }

    pub async fn create_product(&self, input: ProductInput) -> Result<Product, CatalogError> {
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is required".to_owned()));
        }
        if input.price < Decimal::ZERO {
            return Err(CatalogError::Validation(
                "price cannot be negative".to_owned(),
            ));
        }
        self.store
            .category(input.category_id)
            .await?
            .ok_or(CatalogError::UnknownCategory)?;

        let slug = input
            .slug
            .as_deref()
            .and_then(slugify)
            .or_else(|| slugify(&name))
            .unwrap_or_else(|| fallback_slug("product"));
        let sku = input
            .sku
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| generate_sku(&name));

        let now = Utc::now();
        Ok(self
            .store
            .insert_product(Product {
                id: ProductId::generate(),
                name,
                slug,
                description: input.description,
                short_description: input.short_description,
                price: input.price,
                compare_price: input.compare_price,
                sku,
                category_id: input.category_id,
                images: input.images,
                stock: input.stock,
                sales: Sales::default(),
                rating: Rating::default(),
                tags: input.tags,
                is_active: input.is_active.unwrap_or(true),
                is_featured: input.is_featured.unwrap_or(false),
                created_at: now,
                updated_at: now,
            })
            .await?)
    }

    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        let mut product = self
            .store
            .product(id)
            .await?
            .ok_or(CatalogError::NotFound("product"))?;

        if let Some(name) = patch.name {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(CatalogError::Validation("name cannot be empty".to_owned()));
            }
            product.name = name;
        }
        if let Some(slug) = patch.slug.as_deref().and_then(slugify) {
            product.slug = slug;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(short_description) = patch.short_description {
            product.short_description = Some(short_description);
        }
        if let Some(price) = patch.price {
            if price < Decimal::ZERO {
                return Err(CatalogError::Validation(
                    "price cannot be negative".to_owned(),
                ));
            }
            product.price = price;
        }
        if let Some(compare_price) = patch.compare_price {
            product.compare_price = compare_price;
        }
        if let Some(category_id) = patch.category_id {
            self.store
                .category(category_id)
                .await?
                .ok_or(CatalogError::UnknownCategory)?;
            product.category_id = category_id;
        }
        if let Some(images) = patch.images {
            product.images = images;
        }
        if let Some(stock) = patch.stock {
            if stock.quantity < 0 {
                return Err(CatalogError::Validation(
                    "stock quantity cannot be negative".to_owned(),
                ));
            }
            product.stock = stock;
        }
        if let Some(tags) = patch.tags {
            product.tags = tags;
        }
        if let Some(is_active) = patch.is_active {
            product.is_active = is_active;
        }
        if let Some(is_featured) = patch.is_featured {
            product.is_featured = is_featured;
        }
        product.updated_at = Utc::now();
        Ok(self.store.update_product(product).await?)
    }

    /// Flip a product's featured flag.
    pub async fn toggle_featured(&self, id: ProductId) -> Result<Product, CatalogError> {
        let mut product = self
            .store
            .product(id)
            .await?
            .ok_or(CatalogError::NotFound("product"))?;
        product.is_featured = !product.is_featured;
        product.updated_at = Utc::now();
        Ok(self.store.update_product(product).await?)
    }

    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        if !self.store.delete_product(id).await? {
            return Err(CatalogError::NotFound("product"));
        }
        Ok(())
    }

    /// Reject a parent assignment that would make `id` its own
    /// ancestor. Walks up from the proposed parent, bailing out after
    /// [`MAX_CATEGORY_DEPTH`] hops.
    async fn ensure_no_cycle(
        &self,
        id: CategoryId,
        parent_id: CategoryId,
    ) -> Result<(), CatalogError> {
        if parent_id == id {
            return Err(CatalogError::CategoryCycle);
        }
        let mut cursor = parent_id;
        for _ in 0..MAX_CATEGORY_DEPTH {
            let Some(current) = self.store.category(cursor).await? else {
                return Err(CatalogError::UnknownCategory);
            };
            match current.parent_id {
                Some(next) if next == id => return Err(CatalogError::CategoryCycle),
                Some(next) => cursor = next,
                None => return Ok(()),
            }
        }
        Err(CatalogError::CategoryCycle)
    }
}

/// Slug of last resort when a name produces no usable characters.
fn fallback_slug(prefix: &str) -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    format!("{prefix}-{}-{}", base36(millis), random_base36(4))
}

/// SKU from the first three alphanumeric characters of the name plus a
/// random suffix.
fn generate_sku(name: &str) -> String {
    let prefix: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let prefix = if prefix.is_empty() {
        "SKU".to_owned()
    } else {
        prefix
    };
    format!("{prefix}-{}", random_base36(6).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_uses_name_prefix() {
        let sku = generate_sku("Honey Jar");
        assert!(sku.starts_with("HON-"));
        assert_eq!(sku.len(), 10);
    }

    #[test]
    fn sku_for_non_ascii_name_falls_back() {
        let sku = generate_sku("عسل");
        assert!(sku.starts_with("SKU-"));
    }

    #[test]
    fn fallback_slug_is_unique_enough() {
        let a = fallback_slug("product");
        let b = fallback_slug("product");
        assert!(a.starts_with("product-"));
        assert_ne!(a, b);
    }
}
