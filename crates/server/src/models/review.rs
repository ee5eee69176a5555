//! Review domain type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souq_core::{OrderId, ProductId, ReviewId, UserId};

/// A product review.
///
/// At most one review exists per (user, product) pair. Every persisted
/// write recomputes the parent product's rating aggregate from the
/// approved reviews of that product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub order_id: Option<OrderId>,
    /// 1-5 inclusive.
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub images: Vec<String>,
    /// True only when the reviewer has a delivered order containing
    /// this product.
    pub is_verified: bool,
    pub is_approved: bool,
    /// Users who marked this review helpful. The count exposed to
    /// clients is always this set's size, so it cannot drift.
    pub helpful_users: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Number of helpful marks.
    #[must_use]
    pub fn helpful_count(&self) -> usize {
        self.helpful_users.len()
    }

    /// Toggle the helpful mark for `user_id`, returning whether the
    /// mark is now set.
    pub fn toggle_helpful(&mut self, user_id: UserId) -> bool {
        if let Some(pos) = self.helpful_users.iter().position(|u| *u == user_id) {
            self.helpful_users.remove(pos);
            false
        } else {
            self.helpful_users.push(user_id);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpful_toggle_is_symmetric() {
        let mut review = Review {
            id: ReviewId::generate(),
            user_id: UserId::generate(),
            product_id: ProductId::generate(),
            order_id: None,
            rating: 5,
            title: String::new(),
            comment: "great".to_owned(),
            images: vec![],
            is_verified: false,
            is_approved: true,
            helpful_users: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let voter = UserId::generate();
        assert!(review.toggle_helpful(voter));
        assert_eq!(review.helpful_count(), 1);
        assert!(!review.toggle_helpful(voter));
        assert_eq!(review.helpful_count(), 0);
    }
}
