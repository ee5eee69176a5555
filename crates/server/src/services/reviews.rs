//! Product reviews and the rating aggregate.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use souq_core::{OrderId, ProductId, ReviewId, UserId};

use crate::models::Review;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("product already reviewed")]
    AlreadyReviewed,

    #[error("product not found")]
    ProductNotFound,

    #[error("review not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub product_id: ProductId,
    pub order_id: Option<OrderId>,
    pub rating: u8,
    #[serde(default)]
    pub title: String,
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn Store>,
}

impl ReviewService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a review; one per user and product. The review counts as
    /// a verified purchase when it references a delivered order of the
    /// reviewer containing the product.
    pub async fn create(&self, user_id: UserId, input: ReviewInput) -> Result<Review, ReviewError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ReviewError::InvalidRating);
        }
        let comment = input.comment.trim().to_owned();
        if comment.is_empty() {
            return Err(ReviewError::Validation("comment is required".to_owned()));
        }
        self.store
            .product(input.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(ReviewError::ProductNotFound)?;

        let is_verified = match input.order_id {
            Some(order_id) => {
                self.store
                    .delivered_order_contains(user_id, order_id, input.product_id)
                    .await?
            }
            None => false,
        };

        let now = Utc::now();
        let review = Review {
            id: ReviewId::generate(),
            user_id,
            product_id: input.product_id,
            order_id: input.order_id,
            rating: input.rating,
            title: input.title.trim().to_owned(),
            comment,
            images: input.images,
            is_verified,
            is_approved: true,
            helpful_users: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_review(review).await.map_err(|e| match e {
            StoreError::Conflict(_) => ReviewError::AlreadyReviewed,
            other => ReviewError::Store(other),
        })
    }

    /// Flip the caller's helpful vote. Returns the review and whether
    /// the vote is now set.
    pub async fn toggle_helpful(
        &self,
        id: ReviewId,
        user_id: UserId,
    ) -> Result<(Review, bool), ReviewError> {
        let mut review = self.store.review(id).await?.ok_or(ReviewError::NotFound)?;
        let now_set = review.toggle_helpful(user_id);
        review.updated_at = Utc::now();
        let review = self.store.update_review(review).await?;
        Ok((review, now_set))
    }

    /// Moderation switch; the product aggregate follows approval.
    pub async fn set_approval(&self, id: ReviewId, approved: bool) -> Result<Review, ReviewError> {
        let mut review = self.store.review(id).await?.ok_or(ReviewError::NotFound)?;
        review.is_approved = approved;
        review.updated_at = Utc::now();
        Ok(self.store.update_review(review).await?)
    }
}
