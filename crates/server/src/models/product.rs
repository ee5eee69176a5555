//! Product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use souq_core::{CategoryId, ProductId};

/// A catalog image with its display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Inventory sub-record.
///
/// When `track_inventory` is off, `quantity` is ignored and the product
/// sells as if unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stock {
    pub quantity: i64,
    pub track_inventory: bool,
    pub low_stock_threshold: i64,
}

impl Default for Stock {
    fn default() -> Self {
        Self {
            quantity: 0,
            track_inventory: true,
            low_stock_threshold: 10,
        }
    }
}

/// Lifetime sales counters, maintained by the order workflow.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sales {
    pub count: i64,
    pub revenue: Decimal,
}

/// Review aggregate, recomputed on every review write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub average: f64,
    pub count: i64,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unique URL slug, assigned once at creation.
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    /// Unique stock-keeping unit, derived from the name when not supplied.
    pub sku: String,
    pub category_id: CategoryId,
    pub images: Vec<ProductImage>,
    pub stock: Stock,
    pub sales: Sales,
    pub rating: Rating,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// URL of the primary image, or the first image, or empty.
    ///
    /// Order line items snapshot this value at placement time.
    #[must_use]
    pub fn primary_image_url(&self) -> &str {
        self.images
            .iter()
            .find(|i| i.is_primary)
            .or_else(|| self.images.first())
            .map_or("", |i| i.url.as_str())
    }

    /// Whether tracked stock has fallen to or below the threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock.track_inventory && self.stock.quantity <= self.stock.low_stock_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str, is_primary: bool) -> ProductImage {
        ProductImage {
            url: url.to_owned(),
            alt: None,
            is_primary,
        }
    }

    #[test]
    fn primary_image_prefers_flagged() {
        let mut product = sample();
        product.images = vec![image("/a.jpg", false), image("/b.jpg", true)];
        assert_eq!(product.primary_image_url(), "/b.jpg");
    }

    #[test]
    fn primary_image_falls_back_to_first_then_empty() {
        let mut product = sample();
        product.images = vec![image("/a.jpg", false)];
        assert_eq!(product.primary_image_url(), "/a.jpg");

        product.images.clear();
        assert_eq!(product.primary_image_url(), "");
    }

    #[test]
    fn low_stock_ignores_untracked() {
        let mut product = sample();
        product.stock = Stock {
            quantity: 2,
            track_inventory: false,
            low_stock_threshold: 10,
        };
        assert!(!product.is_low_stock());

        product.stock.track_inventory = true;
        assert!(product.is_low_stock());
    }

    fn sample() -> Product {
        Product {
            id: ProductId::generate(),
            name: "Test".to_owned(),
            slug: "test".to_owned(),
            description: "A product".to_owned(),
            short_description: None,
            price: Decimal::new(1000, 2),
            compare_price: None,
            sku: "TES-ABC123".to_owned(),
            category_id: CategoryId::generate(),
            images: vec![],
            stock: Stock::default(),
            sales: Sales::default(),
            rating: Rating::default(),
            tags: vec![],
            is_active: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
