//! User domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souq_core::{Email, ProductId, Role, UserId};

/// A storefront account.
///
/// `password_hash` is absent for federated-identity accounts (signed in
/// via Google) and is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub phone: Option<String>,
    pub address: Option<serde_json::Value>,
    pub avatar: String,
    pub role: Role,
    pub is_active: bool,
    /// Ordered product references, de-duplicated on insert.
    pub wishlist: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Compact identity payload for auth responses.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role,
            "avatar": self.avatar,
        })
    }
}
