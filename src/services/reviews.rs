//! Purchase-gated product reviews.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{ReplyPicker, Review};
use crate::domain::events::{DomainEvent, ReviewEvent};
use crate::domain::value_objects::{non_blank, Rating};
use crate::services::{Caller, EventPublisher};
use crate::store::Store;
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    picker: Arc<dyn ReplyPicker>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, picker: Arc<dyn ReplyPicker>) -> Self {
        Self { store, events, picker }
    }

    pub async fn list(&self, product_id: Uuid) -> Result<Vec<Review>> {
        self.store.reviews_for(product_id).await
    }

    pub async fn submit(&self, caller: &Caller, product_id: Uuid, rating: i32, comment: &str) -> Result<Review> {
        let rating = Rating::new(rating).map_err(|e| ShopError::Validation(e.to_string()))?;
        let comment = non_blank(Some(comment)).ok_or_else(|| ShopError::Validation("Comment must not be empty".into()))?;

        if !self.store.has_purchased(caller.user_id, product_id).await? {
            return Err(ShopError::NotPurchased);
        }
        if self.store.review_by_author(caller.user_id, product_id).await?.is_some() {
            return Err(ShopError::AlreadyReviewed);
        }

        let review = Review::submit(caller.user_id, product_id, rating, &comment, self.picker.as_ref());
        // The unique (user, product) key settles a race between two submissions.
        self.store.insert_review(&review).await?;

        tracing::info!(review_id = %review.id, %product_id, rating = review.rating.stars(), auto_reply = review.is_auto_reply, "review submitted");
        self.events
            .publish(DomainEvent::Review(ReviewEvent::Submitted {
                review_id: review.id,
                product_id,
                rating: i32::from(review.rating),
                auto_replied: review.is_auto_reply,
            }))
            .await;
        Ok(review)
    }

    /// Staff reply, replacing any earlier one.
    pub async fn reply(&self, caller: &Caller, id: Uuid, text: &str) -> Result<Review> {
        caller.require_admin()?;
        let text = non_blank(Some(text)).ok_or_else(|| ShopError::Validation("Reply must not be empty".into()))?;
        let review = self.store.reply_to_review(id, &text).await?.ok_or(ShopError::NotFound("Review"))?;
        tracing::info!(review_id = %id, "review answered");
        self.events.publish(DomainEvent::Review(ReviewEvent::Replied { review_id: id })).await;
        Ok(review)
    }
}
