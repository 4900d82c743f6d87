//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, PaymentStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Inventory(InventoryEvent),
    Promo(PromoEvent),
    Review(ReviewEvent),
    Support(SupportEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_number: String, user_id: Option<Uuid>, total: i64 },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    PaymentStatusChanged { order_id: Uuid, from: PaymentStatus, to: PaymentStatus },
    Cancelled { order_id: Uuid, needs_refund: bool },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InventoryEvent {
    StockTaken { order_id: Uuid, lines: Vec<StockLine> },
    StockRestored { order_id: Uuid, lines: Vec<StockLine> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine { pub product_id: Uuid, pub quantity: i32 }

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PromoEvent {
    Redeemed { promo_id: Uuid, order_id: Uuid },
    Released { promo_id: Uuid, order_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReviewEvent {
    Submitted { review_id: Uuid, product_id: Uuid, rating: i32, auto_replied: bool },
    Replied { review_id: Uuid },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupportEvent {
    MessagePosted { chat_id: Uuid, message_id: Uuid, from_staff: bool },
}

impl DomainEvent {
    /// Message-bus subject, `techshop.<area>.<event>`.
    pub fn subject(&self) -> String {
        let (area, name) = match self {
            Self::Order(e) => ("orders", match e {
                OrderEvent::Placed { .. } => "placed",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::PaymentStatusChanged { .. } => "payment_status_changed",
                OrderEvent::Cancelled { .. } => "cancelled",
            }),
            Self::Inventory(e) => ("inventory", match e {
                InventoryEvent::StockTaken { .. } => "stock_taken",
                InventoryEvent::StockRestored { .. } => "stock_restored",
            }),
            Self::Promo(e) => ("promo", match e {
                PromoEvent::Redeemed { .. } => "redeemed",
                PromoEvent::Released { .. } => "released",
            }),
            Self::Review(e) => ("reviews", match e {
                ReviewEvent::Submitted { .. } => "submitted",
                ReviewEvent::Replied { .. } => "replied",
            }),
            Self::Support(SupportEvent::MessagePosted { .. }) => ("support", "message_posted"),
        };
        format!("techshop.{area}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_payload() {
        let e = DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil(), needs_refund: true });
        assert_eq!(e.subject(), "techshop.orders.cancelled");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["event"], "cancelled");
        assert_eq!(json["needs_refund"], true);
    }
}
