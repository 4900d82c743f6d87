//! Review Aggregate

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Rating;

/// Celebratory replies posted automatically under five-star reviews.
pub const AUTO_REPLIES: [&str; 4] = [
    "Thank you for the great rating! We're glad you love it. Hope to see you again! 😊",
    "Thanks for the excellent review! Your opinion means a lot to us. Until next time! ⭐",
    "Thank you for your purchase and the 5 stars! Happy we could help. All the best! 🎉",
    "A great rating is the best reward for us! Thanks for choosing TechShop. 💙",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: Rating,
    pub comment: String,
    pub admin_reply: Option<String>,
    pub is_auto_reply: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Picks which of the auto-reply templates to use.
pub trait ReplyPicker: Send + Sync {
    /// Returns an index below `count`.
    fn pick(&self, count: usize) -> usize;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomReplyPicker;

impl ReplyPicker for RandomReplyPicker {
    fn pick(&self, count: usize) -> usize { rand::thread_rng().gen_range(0..count) }
}

/// Always the same template.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedReplyPicker(pub usize);

impl ReplyPicker for FixedReplyPicker {
    fn pick(&self, count: usize) -> usize { self.0 % count }
}

impl Review {
    /// A fresh review; five stars get an automatic reply, anything else waits for staff.
    pub fn submit(user_id: Uuid, product_id: Uuid, rating: Rating, comment: &str, picker: &dyn ReplyPicker) -> Self {
        let now = Utc::now();
        let admin_reply = rating.is_max().then(|| AUTO_REPLIES[picker.pick(AUTO_REPLIES.len())].to_string());
        Self {
            id: Uuid::now_v7(), user_id, product_id, rating, comment: comment.trim().to_string(),
            is_auto_reply: admin_reply.is_some(), admin_reply, created_at: now, updated_at: now,
        }
    }

    /// Staff reply; replaces any earlier reply, automatic or not.
    pub fn reply(&mut self, text: &str) {
        self.admin_reply = Some(text.trim().to_string());
        self.is_auto_reply = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_stars_get_auto_reply() {
        let r = Review::submit(Uuid::now_v7(), Uuid::now_v7(), Rating::new(5).unwrap(), "  Great  ", &FixedReplyPicker(2));
        assert_eq!(r.admin_reply.as_deref(), Some(AUTO_REPLIES[2]));
        assert!(r.is_auto_reply);
        assert_eq!(r.comment, "Great");
    }

    #[test]
    fn test_lower_ratings_wait_for_staff() {
        for stars in 1..=4 {
            let r = Review::submit(Uuid::now_v7(), Uuid::now_v7(), Rating::new(stars).unwrap(), "ok", &RandomReplyPicker);
            assert!(r.admin_reply.is_none());
            assert!(!r.is_auto_reply);
        }
    }

    #[test]
    fn test_staff_reply_clears_auto_flag() {
        let mut r = Review::submit(Uuid::now_v7(), Uuid::now_v7(), Rating::new(5).unwrap(), "wow", &RandomReplyPicker);
        assert!(AUTO_REPLIES.contains(&r.admin_reply.as_deref().unwrap()));
        r.reply(" Thanks from the team ");
        assert_eq!(r.admin_reply.as_deref(), Some("Thanks from the team"));
        assert!(!r.is_auto_reply);
    }

    #[test]
    fn test_fixed_picker_wraps() {
        assert_eq!(FixedReplyPicker(6).pick(4), 2);
    }
}
