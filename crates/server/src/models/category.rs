//! Category domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souq_core::CategoryId;

/// A catalog category.
///
/// Categories form a tree via `parent_id`; the catalog service rejects
/// parent assignments that would introduce a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique display name.
    pub name: String,
    /// Unique URL slug, assigned once at creation.
    pub slug: String,
    pub description: Option<String>,
    pub image: String,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    /// Sort key for listings (ascending, ties broken by name).
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
