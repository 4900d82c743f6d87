//! Checkout and the order lifecycle.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{
    CheckoutLine, CustomerContact, Lifecycle, Order, OrderItem, OrderStatus, OrderTotals, PaymentStatus, PromoRejection,
    SideEffect, Transition,
};
use crate::domain::events::{DomainEvent, InventoryEvent, OrderEvent, PromoEvent, StockLine};
use crate::domain::value_objects::{non_blank, PromoCodeKey};
use crate::services::{Caller, EventPublisher};
use crate::store::{ChangeOutcome, OrderDraft, OrderFilter, PromoRedemption, StatusChange, Store};
use crate::{Result, ShopError};

/// Lost compare-and-set races tolerated before giving up on a status change.
const STATUS_ATTEMPTS: usize = 3;

/// How the shopper pointed at a promo code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromoRef {
    Id(Uuid),
    Code(String),
}

#[derive(Clone, Debug, Default)]
pub struct PlaceOrder {
    pub customer: CustomerContact,
    pub delivery_cost: i64,
    pub lines: Vec<CheckoutLine>,
    pub promo: Option<PromoRef>,
    /// What the client displayed; informational only.
    pub client_discount: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub order: Order,
    pub needs_refund: bool,
    pub restored_stock: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(flatten)]
    pub order: Order,
    pub needs_refund: bool,
    pub restored_stock: bool,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    lifecycle: Lifecycle,
}

struct Applied {
    before: Order,
    after: Order,
    transition: Option<Transition>,
}

impl Applied {
    fn moved(&self) -> Option<Transition> { self.transition.filter(|t| !t.is_noop()) }

    fn restored_stock(&self) -> bool { self.moved().is_some_and(|t| t.has(SideEffect::RestoreStock)) }
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, lifecycle: Lifecycle) -> Self {
        Self { store, events, lifecycle }
    }

    /// Prices the cart from live product data and places the order. `user_id` is
    /// `None` for guest checkout.
    pub async fn place(&self, user_id: Option<Uuid>, req: PlaceOrder) -> Result<Order> {
        if req.lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        if req.lines.iter().any(|l| l.quantity <= 0) {
            return Err(ShopError::Validation("Quantity must be at least 1".into()));
        }
        if req.delivery_cost < 0 {
            return Err(ShopError::Validation("Delivery cost must not be negative".into()));
        }

        let mut lines: Vec<OrderItem> = Vec::with_capacity(req.lines.len());
        for wanted in merge_lines(&req.lines) {
            let product = self.store.product(wanted.product_id).await?.ok_or(ShopError::ProductUnavailable(wanted.product_id))?;
            product.ensure_can_fulfil(wanted.quantity)?;
            lines.push(OrderItem {
                id: Uuid::now_v7(),
                product_id: product.id,
                product_name: product.name,
                quantity: wanted.quantity,
                price: product.price,
            });
        }
        let subtotal = OrderTotals::subtotal_of(&lines)?;

        let placed_at = Utc::now();
        let promo = match &req.promo {
            Some(reference) => {
                let promo = match reference {
                    PromoRef::Id(id) => self.store.promo(*id).await?,
                    PromoRef::Code(code) => match PromoCodeKey::new(code) {
                        Ok(key) => self.store.promo_by_code(&key).await?,
                        Err(_) => None,
                    },
                }
                .ok_or(PromoRejection::NotFound)?;
                let applied = promo.evaluate(subtotal, placed_at)?;
                if req.client_discount.is_some_and(|d| d != applied.discount) {
                    tracing::warn!(
                        code = %applied.code,
                        client = ?req.client_discount,
                        server = applied.discount,
                        "client discount disagrees with server pricing"
                    );
                }
                Some(PromoRedemption { promo_id: applied.id, discount: applied.discount })
            }
            None if req.client_discount.is_some_and(|d| d != 0) => {
                return Err(ShopError::Validation("A discount requires a promo code".into()));
            }
            None => None,
        };

        let totals = OrderTotals::compute(subtotal, req.delivery_cost, promo.map_or(0, |p| p.discount))?;
        let draft = OrderDraft {
            id: Uuid::now_v7(),
            user_id,
            customer: req.customer,
            lines,
            totals,
            promo,
            notes: non_blank(req.notes.as_deref()),
            placed_at,
        };
        let order = self.store.place_order(&draft).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            user_id = ?order.user_id,
            total = order.total,
            lines = order.items.len(),
            "order placed"
        );
        let mut events = vec![
            DomainEvent::Order(OrderEvent::Placed {
                order_id: order.id,
                order_number: order.order_number.clone(),
                user_id: order.user_id,
                total: order.total,
            }),
            DomainEvent::Inventory(InventoryEvent::StockTaken { order_id: order.id, lines: stock_lines(&order) }),
        ];
        if let Some(promo_id) = order.promo_code_id {
            events.push(DomainEvent::Promo(PromoEvent::Redeemed { promo_id, order_id: order.id }));
        }
        self.events.publish_all(events).await;
        Ok(order)
    }

    /// The caller's own orders, or every order for staff. Newest first.
    pub async fn list(&self, caller: &Caller, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let user_id = if caller.is_admin() { None } else { Some(caller.user_id) };
        self.store.orders(OrderFilter { user_id, status }).await
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> Result<Order> {
        let order = self.store.order(id).await?.ok_or(ShopError::NotFound("Order"))?;
        if !caller.is_admin() && !order.is_owned_by(caller.user_id) {
            return Err(ShopError::forbidden());
        }
        Ok(order)
    }

    /// Self-service cancellation by the order's owner. Repeating it is harmless.
    pub async fn cancel(&self, caller: &Caller, id: Uuid) -> Result<CancelOutcome> {
        let user_id = caller.user_id;
        let applied = self
            .apply(id, Some(OrderStatus::Cancelled), None, |order| {
                if order.is_owned_by(user_id) { Ok(()) } else { Err(ShopError::forbidden()) }
            })
            .await?;
        let restored_stock = applied.restored_stock();
        Ok(CancelOutcome { needs_refund: applied.after.needs_refund(), restored_stock, order: applied.after })
    }

    /// Staff status and/or payment update.
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<StatusUpdate> {
        caller.require_admin()?;
        if status.is_none() && payment_status.is_none() {
            return Err(ShopError::Validation("Nothing to update".into()));
        }
        let applied = self.apply(id, status, payment_status, |_| Ok(())).await?;
        let restored_stock = applied.restored_stock();
        Ok(StatusUpdate { needs_refund: applied.after.needs_refund(), restored_stock, order: applied.after })
    }

    async fn apply(
        &self,
        id: Uuid,
        target: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
        guard: impl Fn(&Order) -> Result<()> + Send + Sync,
    ) -> Result<Applied> {
        for attempt in 1..=STATUS_ATTEMPTS {
            let before = self.store.order(id).await?.ok_or(ShopError::NotFound("Order"))?;
            guard(&before)?;
            let transition = target.map(|to| self.lifecycle.plan(before.status, to)).transpose()?;
            let payment_status = payment_status.filter(|p| *p != before.payment_status);

            if transition.map_or(true, |t| t.is_noop()) && payment_status.is_none() {
                tracing::debug!(order_id = %id, status = %before.status, "status change is a no-op");
                let after = before.clone();
                return Ok(Applied { before, after, transition });
            }

            let change = StatusChange { expected: before.status, transition, payment_status };
            match self.store.change_order_status(id, &change).await? {
                ChangeOutcome::Applied(after) => {
                    let applied = Applied { before, after, transition };
                    self.announce(&applied).await;
                    return Ok(applied);
                }
                ChangeOutcome::StatusMoved => {
                    tracing::warn!(order_id = %id, attempt, expected = %before.status, "order changed underneath us, retrying");
                }
            }
        }
        Err(ShopError::Conflict("Order is being updated by someone else, please retry".into()))
    }

    async fn announce(&self, applied: &Applied) {
        let order = &applied.after;
        let mut events = Vec::new();
        if let Some(t) = applied.moved() {
            tracing::info!(order_id = %order.id, from = %t.from, to = %t.to, effects = ?t.effects, "order status changed");
            events.push(DomainEvent::Order(OrderEvent::StatusChanged { order_id: order.id, from: t.from, to: t.to }));
            if t.to == OrderStatus::Cancelled {
                events.push(DomainEvent::Order(OrderEvent::Cancelled { order_id: order.id, needs_refund: order.needs_refund() }));
                if order.needs_refund() {
                    tracing::info!(order_id = %order.id, total = order.total, "cancelled order was paid, refund required");
                }
            }
            if t.has(SideEffect::RestoreStock) {
                events.push(DomainEvent::Inventory(InventoryEvent::StockRestored { order_id: order.id, lines: stock_lines(order) }));
            }
            if let (true, Some(promo_id)) = (t.has(SideEffect::ReleasePromoUsage), order.promo_code_id) {
                events.push(DomainEvent::Promo(PromoEvent::Released { promo_id, order_id: order.id }));
            }
        }
        if applied.before.payment_status != order.payment_status {
            tracing::info!(order_id = %order.id, from = %applied.before.payment_status, to = %order.payment_status, "payment status changed");
            events.push(DomainEvent::Order(OrderEvent::PaymentStatusChanged {
                order_id: order.id,
                from: applied.before.payment_status,
                to: order.payment_status,
            }));
        }
        self.events.publish_all(events).await;
    }
}

/// One line per product, quantities summed, in first-seen order.
fn merge_lines(lines: &[CheckoutLine]) -> Vec<CheckoutLine> {
    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(m) => m.quantity = m.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

fn stock_lines(order: &Order) -> Vec<StockLine> {
    order.items.iter().map(|i| StockLine { product_id: i.product_id, quantity: i.quantity }).collect()
}
