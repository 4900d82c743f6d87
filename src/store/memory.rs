//! In-memory store for tests and local demos.
//!
//! A single lock guards all state, so every method is trivially atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{ChangeOutcome, OrderDraft, OrderFilter, StatusChange, Store, ORDER_NUMBER_ATTEMPTS};
use crate::domain::aggregates::{
    Author, Order, PaymentStatus, Product, PromoCode, PromoRejection, Review, SideEffect, SupportChat,
    SupportMessage,
};
use crate::domain::value_objects::{OrderNumber, PromoCodeKey};
use crate::{Result, ShopError};

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    promos: HashMap<Uuid, PromoCode>,
    orders: Vec<Order>,
    reviews: Vec<Review>,
    chats: Vec<SupportChat>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert_product(&self, product: Product) -> Result<()> {
        self.with(|s| {
            s.products.insert(product.id, product);
            Ok(())
        })
    }

    /// Test hook standing in for the payment collaborator.
    pub fn set_payment_status(&self, order_id: Uuid, status: PaymentStatus) -> Result<()> {
        self.with(|s| {
            let order = s.orders.iter_mut().find(|o| o.id == order_id).ok_or(ShopError::NotFound("Order"))?;
            order.payment_status = status;
            Ok(())
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().map_err(|_| ShopError::Corrupt("memory store lock poisoned".into()))?;
        f(&mut state)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        self.with(|s| Ok(s.products.get(&id).cloned()))
    }

    async fn promo(&self, id: Uuid) -> Result<Option<PromoCode>> {
        self.with(|s| Ok(s.promos.get(&id).cloned()))
    }

    async fn promo_by_code(&self, code: &PromoCodeKey) -> Result<Option<PromoCode>> {
        self.with(|s| Ok(s.promos.values().find(|p| &p.code == code).cloned()))
    }

    async fn promos(&self) -> Result<Vec<PromoCode>> {
        self.with(|s| {
            let mut all: Vec<_> = s.promos.values().cloned().collect();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(all)
        })
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        self.with(|s| {
            if s.promos.values().any(|p| p.code == promo.code) {
                return Err(ShopError::Conflict(format!("Promo code {} already exists", promo.code)));
            }
            s.promos.insert(promo.id, promo.clone());
            Ok(())
        })
    }

    async fn delete_promo(&self, id: Uuid) -> Result<bool> {
        self.with(|s| {
            let removed = s.promos.remove(&id).is_some();
            for order in s.orders.iter_mut().filter(|o| o.promo_code_id == Some(id)) {
                order.promo_code_id = None;
            }
            Ok(removed)
        })
    }

    async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        self.with(|s| {
            // Work on copies so a failing line leaves every product untouched.
            let mut touched: HashMap<Uuid, Product> = HashMap::new();
            for line in &draft.lines {
                let product = match touched.entry(line.product_id) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => e.insert(
                        s.products.get(&line.product_id).cloned().ok_or(ShopError::ProductUnavailable(line.product_id))?,
                    ),
                };
                product.take_stock(line.quantity)?;
            }

            let promo = match draft.promo {
                Some(redemption) => {
                    let mut promo = s.promos.get(&redemption.promo_id).cloned().ok_or(PromoRejection::NotFound)?;
                    let applied = promo.evaluate(draft.totals.subtotal, draft.placed_at)?;
                    if applied.discount != redemption.discount {
                        return Err(ShopError::Conflict("Promo code has changed, please apply it again".into()));
                    }
                    promo.redeem()?;
                    Some(promo)
                }
                None => None,
            };

            let mut number = None;
            for _ in 0..ORDER_NUMBER_ATTEMPTS {
                let candidate = OrderNumber::generate(draft.placed_at, &mut rand::thread_rng());
                if !s.orders.iter().any(|o| o.order_number == candidate.as_str()) {
                    number = Some(candidate);
                    break;
                }
            }
            let number = number.ok_or_else(|| ShopError::Conflict("Could not allocate an order number, please retry".into()))?;

            let order = draft.to_order(number.into_string());
            s.products.extend(touched);
            if let Some(promo) = promo {
                s.promos.insert(promo.id, promo);
            }
            s.orders.push(order.clone());
            Ok(order)
        })
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        self.with(|s| Ok(s.orders.iter().find(|o| o.id == id).cloned()))
    }

    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        self.with(|s| {
            let mut found: Vec<Order> = s
                .orders
                .iter()
                .filter(|o| filter.user_id.map_or(true, |u| o.user_id == Some(u)))
                .filter(|o| filter.status.map_or(true, |st| o.status == st))
                .cloned()
                .collect();
            found.reverse();
            Ok(found)
        })
    }

    async fn change_order_status(&self, id: Uuid, change: &StatusChange) -> Result<ChangeOutcome> {
        self.with(|s| {
            let idx = s.orders.iter().position(|o| o.id == id).ok_or(ShopError::NotFound("Order"))?;
            if s.orders[idx].status != change.expected {
                return Ok(ChangeOutcome::StatusMoved);
            }
            if let Some(t) = change.transition.filter(|t| !t.is_noop()) {
                let order = s.orders[idx].clone();
                if t.has(SideEffect::RestoreStock) {
                    for item in &order.items {
                        if let Some(p) = s.products.get_mut(&item.product_id) {
                            p.restore_stock(item.quantity);
                        }
                    }
                }
                if t.has(SideEffect::ReleasePromoUsage) {
                    if let Some(promo) = order.promo_code_id.and_then(|pid| s.promos.get_mut(&pid)) {
                        promo.release();
                    }
                }
                s.orders[idx].status = t.to;
            }
            if let Some(payment) = change.payment_status {
                s.orders[idx].payment_status = payment;
            }
            s.orders[idx].updated_at = Utc::now();
            Ok(ChangeOutcome::Applied(s.orders[idx].clone()))
        })
    }

    async fn has_purchased(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        self.with(|s| {
            Ok(s.orders.iter().any(|o| {
                o.is_owned_by(user_id) && o.status.counts_as_purchase() && o.contains_product(product_id)
            }))
        })
    }

    async fn review_by_author(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<Review>> {
        self.with(|s| Ok(s.reviews.iter().find(|r| r.user_id == user_id && r.product_id == product_id).cloned()))
    }

    async fn insert_review(&self, review: &Review) -> Result<()> {
        self.with(|s| {
            if s.reviews.iter().any(|r| r.user_id == review.user_id && r.product_id == review.product_id) {
                return Err(ShopError::AlreadyReviewed);
            }
            s.reviews.push(review.clone());
            Ok(())
        })
    }

    async fn reviews_for(&self, product_id: Uuid) -> Result<Vec<Review>> {
        self.with(|s| Ok(s.reviews.iter().rev().filter(|r| r.product_id == product_id).cloned().collect()))
    }

    async fn reply_to_review(&self, id: Uuid, reply: &str) -> Result<Option<Review>> {
        self.with(|s| {
            Ok(s.reviews.iter_mut().find(|r| r.id == id).map(|r| {
                r.reply(reply);
                r.clone()
            }))
        })
    }

    async fn open_chat(&self, user_id: Uuid) -> Result<SupportChat> {
        self.with(|s| {
            if let Some(chat) = s.chats.iter().find(|c| c.user_id == user_id && c.is_open()) {
                return Ok(chat.clone());
            }
            let chat = SupportChat::open(user_id);
            s.chats.push(chat.clone());
            Ok(chat)
        })
    }

    async fn chat(&self, id: Uuid) -> Result<Option<SupportChat>> {
        self.with(|s| Ok(s.chats.iter().find(|c| c.id == id).cloned()))
    }

    async fn chats(&self) -> Result<Vec<SupportChat>> {
        self.with(|s| {
            let mut all: Vec<SupportChat> = s
                .chats
                .iter()
                .map(|c| {
                    let mut summary = c.clone();
                    summary.messages = c.last_message().cloned().into_iter().collect();
                    summary
                })
                .collect();
            all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(all)
        })
    }

    async fn post_message(&self, chat_id: Uuid, content: &str, author: Author) -> Result<Option<SupportMessage>> {
        self.with(|s| Ok(s.chats.iter_mut().find(|c| c.id == chat_id).map(|c| c.post(content, author))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CustomerContact, OrderItem, OrderStatus, OrderTotals};

    fn draft(lines: Vec<OrderItem>) -> OrderDraft {
        let subtotal = OrderTotals::subtotal_of(&lines).unwrap();
        OrderDraft {
            id: Uuid::now_v7(),
            user_id: None,
            customer: CustomerContact::default(),
            lines,
            totals: OrderTotals::compute(subtotal, 0, 0).unwrap(),
            promo: None,
            notes: None,
            placed_at: Utc::now(),
        }
    }

    fn line(p: &Product, quantity: i32) -> OrderItem {
        OrderItem { id: Uuid::now_v7(), product_id: p.id, product_name: p.name.clone(), quantity, price: p.price }
    }

    #[tokio::test]
    async fn test_failed_placement_leaves_stock_alone() {
        let store = MemoryStore::new();
        let a = Product::new("A", 100, 5);
        let b = Product::new("B", 100, 1);
        store.insert_product(a.clone()).unwrap();
        store.insert_product(b.clone()).unwrap();

        let err = store.place_order(&draft(vec![line(&a, 2), line(&b, 2)])).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { ref product } if product == "B"));
        assert_eq!(store.product(a.id).await.unwrap().unwrap().stock, 5);
        assert!(store.orders(OrderFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_placement_takes_stock() {
        let store = MemoryStore::new();
        let a = Product::new("A", 250, 5);
        store.insert_product(a.clone()).unwrap();
        let order = store.place_order(&draft(vec![line(&a, 3)])).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.order_number.starts_with("TS-"));
        assert!(order.totals_are_consistent());
        assert_eq!(store.product(a.id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_stale_status_change_is_not_applied() {
        let store = MemoryStore::new();
        let a = Product::new("A", 250, 5);
        store.insert_product(a.clone()).unwrap();
        let order = store.place_order(&draft(vec![line(&a, 1)])).await.unwrap();
        let change = StatusChange { expected: OrderStatus::Shipped, transition: None, payment_status: Some(PaymentStatus::Paid) };
        assert!(matches!(store.change_order_status(order.id, &change).await.unwrap(), ChangeOutcome::StatusMoved));
        assert_eq!(store.order(order.id).await.unwrap().unwrap().payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_one_open_chat_per_user() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let first = store.open_chat(user).await.unwrap();
        let second = store.open_chat(user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_ne!(store.open_chat(Uuid::now_v7()).await.unwrap().id, first.id);
    }
}
