//! Order Aggregate and its lifecycle table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::PromoUsagePolicy;
use crate::ShopError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub customer: CustomerContact,
    pub delivery_cost: i64,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub promo_code_id: Option<Uuid>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price and quantity of one product frozen at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem { pub id: Uuid, pub product_id: Uuid, pub product_name: String, pub quantity: i32, pub price: i64 }

impl OrderItem {
    /// `None` when the line is too large to price.
    pub fn line_total(&self) -> Option<i64> { self.price.checked_mul(i64::from(self.quantity)) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact { pub name: String, pub email: String, pub phone: String, pub delivery_address: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Returning, Returned, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Returning, Self::Returned, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Returning => "RETURNING",
            Self::Returned => "RETURNED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Nothing has left the warehouse yet.
    pub fn is_pre_shipment(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }

    /// The customer has received the goods at some point.
    pub fn counts_as_purchase(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned)
    }

    fn is_main_line(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing | Self::Shipped | Self::Delivered)
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "PENDING", Self::Paid => "PAID", Self::Failed => "FAILED", Self::Refunded => "REFUNDED" }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| format!("unknown order status {s}"))
    }
}

impl FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pending, Self::Paid, Self::Failed, Self::Refunded]
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown payment status {s}"))
    }
}

/// Side effects attached to an edge of the lifecycle table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect {
    /// Put every line's quantity back on its product.
    RestoreStock,
    /// Report that a paid order needs its money returned. Payment status is left alone.
    FlagRefundIfPaid,
    /// Give the redeemed promo use back to its code.
    ReleasePromoUsage,
}

const CANCEL_EFFECTS: &[SideEffect] = &[SideEffect::RestoreStock, SideEffect::FlagRefundIfPaid];
const CANCEL_RELEASING_EFFECTS: &[SideEffect] =
    &[SideEffect::RestoreStock, SideEffect::FlagRefundIfPaid, SideEffect::ReleasePromoUsage];
const RETURN_EFFECTS: &[SideEffect] = &[SideEffect::RestoreStock];

/// A checked edge of the lifecycle, computed before anything is persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub effects: &'static [SideEffect],
}

impl Transition {
    pub fn is_noop(&self) -> bool { self.from == self.to }
    pub fn has(&self, effect: SideEffect) -> bool { self.effects.contains(&effect) }
}

/// `(from, to) -> effects` for every legal status change.
///
/// Main-line states (`PENDING` through `DELIVERED`) may be corrected in either
/// direction by staff. `CANCELLED` is absorbing and only reachable before shipment,
/// returns go `DELIVERED -> RETURNING -> RETURNED`, and a `RETURNING` order may be
/// put back to `DELIVERED` when the return is refused. Repeating the current status
/// is a no-op without effects.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifecycle {
    pub promo_usage: PromoUsagePolicy,
}

impl Lifecycle {
    pub fn new(promo_usage: PromoUsagePolicy) -> Self { Self { promo_usage } }

    pub fn plan(&self, from: OrderStatus, to: OrderStatus) -> Result<Transition, ShopError> {
        use OrderStatus::*;
        let effects: &'static [SideEffect] = match (from, to) {
            (a, b) if a == b => &[],
            (Cancelled, _) => return Err(ShopError::OrderAlreadyCancelled),
            (a, Cancelled) if a.is_pre_shipment() => match self.promo_usage {
                PromoUsagePolicy::Spent => CANCEL_EFFECTS,
                PromoUsagePolicy::ReleaseOnCancel => CANCEL_RELEASING_EFFECTS,
            },
            (a, Cancelled) => return Err(ShopError::NotCancellable(a)),
            (Delivered, Returning) => &[],
            (Returning, Returned) => RETURN_EFFECTS,
            (Returning, Delivered) => &[],
            (a, b) if a.is_main_line() && b.is_main_line() => &[],
            (a, b) => return Err(ShopError::InvalidTransition { from: a, to: b }),
        };
        Ok(Transition { from, to, effects })
    }
}

/// Order money, `total = subtotal + delivery_cost - discount`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals { pub subtotal: i64, pub delivery_cost: i64, pub discount: i64, pub total: i64 }

impl OrderTotals {
    pub fn compute(subtotal: i64, delivery_cost: i64, discount: i64) -> Result<Self, ShopError> {
        if subtotal < 0 || delivery_cost < 0 || discount < 0 {
            return Err(ShopError::Validation("Amounts must not be negative".into()));
        }
        if discount > subtotal {
            return Err(ShopError::Validation("Discount cannot exceed the subtotal".into()));
        }
        let total = subtotal
            .checked_add(delivery_cost)
            .and_then(|t| t.checked_sub(discount))
            .ok_or_else(too_large)?;
        Ok(Self { subtotal, delivery_cost, discount, total })
    }

    /// Sum of the line totals, failing instead of wrapping.
    pub fn subtotal_of(items: &[OrderItem]) -> Result<i64, ShopError> {
        items.iter().try_fold(0i64, |acc, item| {
            item.line_total().and_then(|line| acc.checked_add(line)).ok_or_else(too_large)
        })
    }
}

fn too_large() -> ShopError {
    ShopError::Validation("Order amount is too large".into())
}

impl Order {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == Some(user_id) }

    pub fn contains_product(&self, product_id: Uuid) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// Cancelled while the money is still with us.
    pub fn needs_refund(&self) -> bool {
        self.status == OrderStatus::Cancelled && self.payment_status == PaymentStatus::Paid
    }

    pub fn totals_are_consistent(&self) -> bool {
        OrderTotals::subtotal_of(&self.items).is_ok_and(|sum| sum == self.subtotal)
            && self.subtotal.checked_add(self.delivery_cost).and_then(|t| t.checked_sub(self.discount)) == Some(self.total)
            && self.discount >= 0
    }
}
