//! Persistence seam.
//!
//! Every method is one unit of work. Multi-row writes (placing an order, applying a
//! status change) are all-or-nothing: either every row changes or none does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{
    Author, CustomerContact, Order, OrderItem, OrderStatus, OrderTotals, PaymentStatus, Product, PromoCode,
    Review, SupportChat, SupportMessage, Transition,
};
use crate::domain::value_objects::PromoCodeKey;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// How many fresh order numbers to try before giving up.
pub(crate) const ORDER_NUMBER_ATTEMPTS: usize = 8;

/// Everything needed to persist a new order except its number, which the store assigns.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub customer: CustomerContact,
    pub lines: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub promo: Option<PromoRedemption>,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

impl OrderDraft {
    pub(crate) fn to_order(&self, order_number: String) -> Order {
        Order {
            id: self.id,
            order_number,
            user_id: self.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            customer: self.customer.clone(),
            delivery_cost: self.totals.delivery_cost,
            subtotal: self.totals.subtotal,
            discount: self.totals.discount,
            total: self.totals.total,
            promo_code_id: self.promo.map(|p| p.promo_id),
            notes: self.notes.clone(),
            items: self.lines.clone(),
            created_at: self.placed_at,
            updated_at: self.placed_at,
        }
    }

    /// Lines ordered by product id. Row locks taken in this order cannot cross another checkout's.
    pub(crate) fn lines_in_lock_order(&self) -> Vec<&OrderItem> {
        let mut lines: Vec<&OrderItem> = self.lines.iter().collect();
        lines.sort_by_key(|l| l.product_id);
        lines
    }
}

/// A promo the shopper applied, with the discount it was priced at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromoRedemption { pub promo_id: Uuid, pub discount: i64 }

/// A status and/or payment change, applied only if the order is still in `expected`.
#[derive(Clone, Copy, Debug)]
pub struct StatusChange {
    pub expected: OrderStatus,
    pub transition: Option<Transition>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Clone, Debug)]
pub enum ChangeOutcome {
    Applied(Order),
    /// Someone else moved the order first; nothing was written.
    StatusMoved,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OrderFilter { pub user_id: Option<Uuid>, pub status: Option<OrderStatus> }

#[async_trait]
pub trait Store: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn promo(&self, id: Uuid) -> Result<Option<PromoCode>>;
    async fn promo_by_code(&self, code: &PromoCodeKey) -> Result<Option<PromoCode>>;
    async fn promos(&self) -> Result<Vec<PromoCode>>;
    /// Fails with a conflict when the code is taken.
    async fn insert_promo(&self, promo: &PromoCode) -> Result<()>;
    async fn delete_promo(&self, id: Uuid) -> Result<bool>;

    /// Takes stock for every line, redeems the promo and stores the order, atomically.
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;
    /// Newest first.
    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>>;
    /// Writes the change together with the transition's stock and promo effects.
    async fn change_order_status(&self, id: Uuid, change: &StatusChange) -> Result<ChangeOutcome>;

    /// True if the user has a delivered or returned order containing the product.
    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> Result<bool>;
    async fn review_by_author(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<Review>>;
    /// Fails with `AlreadyReviewed` on a second review of the same product.
    async fn insert_review(&self, review: &Review) -> Result<()>;
    /// Newest first.
    async fn reviews_for(&self, product_id: Uuid) -> Result<Vec<Review>>;
    async fn reply_to_review(&self, id: Uuid, reply: &str) -> Result<Option<Review>>;

    /// The user's open chat, created if there is none.
    async fn open_chat(&self, user_id: Uuid) -> Result<SupportChat>;
    async fn chat(&self, id: Uuid) -> Result<Option<SupportChat>>;
    /// Most recently active first, each carrying only its latest message.
    async fn chats(&self) -> Result<Vec<SupportChat>>;
    async fn post_message(&self, chat_id: Uuid, content: &str, author: Author) -> Result<Option<SupportMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(product_id: Uuid) -> OrderItem {
        OrderItem { id: Uuid::now_v7(), product_id, product_name: "X".into(), quantity: 1, price: 10 }
    }

    #[test]
    fn test_lock_order_is_cart_independent() {
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        let draft = |ids: [Uuid; 3]| OrderDraft {
            id: Uuid::now_v7(),
            user_id: None,
            customer: CustomerContact::default(),
            lines: ids.into_iter().map(line).collect(),
            totals: OrderTotals::compute(30, 0, 0).unwrap(),
            promo: None,
            notes: None,
            placed_at: Utc::now(),
        };
        let first = draft([b, c, a]);
        let second = draft([c, a, b]);
        let ids = |d: &OrderDraft| d.lines_in_lock_order().iter().map(|l| l.product_id).collect::<Vec<_>>();
        assert_eq!(ids(&first), vec![a, b, c]);
        assert_eq!(ids(&first), ids(&second));
        // The stored lines keep the shopper's order.
        assert_eq!(first.lines[0].product_id, b);
    }
}
