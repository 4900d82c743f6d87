//! Promo Code Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::PromoCodeKey;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "PERCENTAGE", Self::Fixed => "FIXED" }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DiscountType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(Self::Percentage),
            "FIXED" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: Uuid,
    pub code: PromoCodeKey,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: i64,
    pub min_order: i64,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a promo code cannot be applied. Checked in declaration order.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum PromoRejection {
    #[error("Promo code not found")]
    NotFound,
    #[error("Promo code is not active")]
    Inactive,
    #[error("Promo code has expired")]
    Expired,
    #[error("Promo code usage limit reached")]
    UsageLimitExceeded,
    #[error("Minimum order amount for this code: {min}")]
    BelowMinimumOrder { min: i64 },
}

/// A successfully priced promo, ready to be redeemed at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPromo {
    pub id: Uuid,
    pub code: PromoCodeKey,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub discount: i64,
}

impl PromoCode {
    pub fn create(code: PromoCodeKey, discount_type: DiscountType, value: i64) -> Self {
        Self {
            id: Uuid::now_v7(), code, description: None, discount_type, value, min_order: 0,
            max_uses: None, used_count: 0, is_active: true, expires_at: None, created_at: Utc::now(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    /// Validates the code against `subtotal` at `now` and prices the discount.
    /// Does not touch `used_count`.
    pub fn evaluate(&self, subtotal: i64, now: DateTime<Utc>) -> Result<AppliedPromo, PromoRejection> {
        if !self.is_active { return Err(PromoRejection::Inactive); }
        if self.expires_at.is_some_and(|at| now > at) { return Err(PromoRejection::Expired); }
        if self.is_exhausted() { return Err(PromoRejection::UsageLimitExceeded); }
        if subtotal < self.min_order { return Err(PromoRejection::BelowMinimumOrder { min: self.min_order }); }
        Ok(AppliedPromo {
            id: self.id,
            code: self.code.clone(),
            discount_type: self.discount_type,
            discount_value: self.value,
            discount: self.discount_for(subtotal),
        })
    }

    /// Never negative and never more than the subtotal it discounts.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        let subtotal = subtotal.max(0);
        // Widened so a large subtotal cannot overflow before the cap applies.
        let raw = match self.discount_type {
            DiscountType::Percentage => (i128::from(subtotal) * i128::from(self.value) + 50).div_euclid(100),
            DiscountType::Fixed => i128::from(self.value),
        };
        i64::try_from(raw.clamp(0, i128::from(subtotal))).unwrap_or(subtotal)
    }

    pub fn redeem(&mut self) -> Result<(), PromoRejection> {
        if self.is_exhausted() { return Err(PromoRejection::UsageLimitExceeded); }
        self.used_count += 1;
        Ok(())
    }

    pub fn release(&mut self) { self.used_count = (self.used_count - 1).max(0); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promo(t: DiscountType, value: i64) -> PromoCode {
        PromoCode::create(PromoCodeKey::new("TEST").unwrap(), t, value)
    }

    #[test]
    fn test_percentage_discount() {
        let p = promo(DiscountType::Percentage, 10);
        assert_eq!(p.evaluate(10_000, Utc::now()).unwrap().discount, 1_000);
        // 15% of 1_003 = 150.45
        assert_eq!(promo(DiscountType::Percentage, 15).discount_for(1_003), 150);
        // 10% of 1_005 = 100.5 rounds up
        assert_eq!(p.discount_for(1_005), 101);
    }

    #[test]
    fn test_huge_subtotal_does_not_overflow() {
        let p = promo(DiscountType::Percentage, 10);
        assert_eq!(p.discount_for(4_000_000_000_000_000_000), 400_000_000_000_000_000);
        assert_eq!(promo(DiscountType::Percentage, 100).discount_for(i64::MAX), i64::MAX);
        assert_eq!(promo(DiscountType::Fixed, i64::MAX).discount_for(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let p = promo(DiscountType::Fixed, 5_000);
        assert_eq!(p.evaluate(3_000, Utc::now()).unwrap().discount, 3_000);
        assert_eq!(p.evaluate(8_000, Utc::now()).unwrap().discount, 5_000);
    }

    #[test]
    fn test_rejection_order() {
        let now = Utc::now();
        let mut p = promo(DiscountType::Fixed, 100);
        p.is_active = false;
        p.expires_at = Some(now - Duration::days(1));
        p.max_uses = Some(1);
        p.used_count = 1;
        p.min_order = 1_000_000;
        assert_eq!(p.evaluate(10, now), Err(PromoRejection::Inactive));
        p.is_active = true;
        assert_eq!(p.evaluate(10, now), Err(PromoRejection::Expired));
        p.expires_at = Some(now + Duration::days(1));
        assert_eq!(p.evaluate(10, now), Err(PromoRejection::UsageLimitExceeded));
        p.max_uses = None;
        assert_eq!(p.evaluate(10, now), Err(PromoRejection::BelowMinimumOrder { min: 1_000_000 }));
        assert!(PromoRejection::BelowMinimumOrder { min: 1_000_000 }.to_string().contains("1000000"));
    }

    #[test]
    fn test_redeem_respects_limit() {
        let mut p = promo(DiscountType::Percentage, 5);
        p.max_uses = Some(1);
        p.redeem().unwrap();
        assert_eq!(p.redeem(), Err(PromoRejection::UsageLimitExceeded));
        assert_eq!(p.used_count, 1);
        assert_eq!(p.evaluate(100, Utc::now()), Err(PromoRejection::UsageLimitExceeded));
        p.release();
        p.release();
        assert_eq!(p.used_count, 0);
    }
}
