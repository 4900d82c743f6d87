//! Promo code validation and administration.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{AppliedPromo, DiscountType, PromoCode, PromoRejection};
use crate::domain::value_objects::{non_blank, PromoCodeKey};
use crate::services::Caller;
use crate::store::Store;
use crate::{Result, ShopError};

#[derive(Clone, Debug, Default)]
pub struct NewPromo {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: i64,
    pub min_order: i64,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct PromoService {
    store: Arc<dyn Store>,
}

impl PromoService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Prices `code` against `subtotal` without redeeming it.
    pub async fn validate(&self, code: &str, subtotal: i64) -> Result<AppliedPromo> {
        if subtotal < 0 {
            return Err(ShopError::Validation("Order total must not be negative".into()));
        }
        let key = PromoCodeKey::new(code).map_err(|e| ShopError::Validation(e.to_string()))?;
        let promo = self.store.promo_by_code(&key).await?.ok_or(PromoRejection::NotFound)?;
        let applied = promo.evaluate(subtotal, Utc::now())?;
        tracing::debug!(code = %applied.code, subtotal, discount = applied.discount, "promo code priced");
        Ok(applied)
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<PromoCode>> {
        caller.require_admin()?;
        self.store.promos().await
    }

    pub async fn create(&self, caller: &Caller, input: NewPromo) -> Result<PromoCode> {
        caller.require_admin()?;
        let code = PromoCodeKey::new(&input.code).map_err(|e| ShopError::Validation(e.to_string()))?;
        if input.value <= 0 {
            return Err(ShopError::Validation("Discount value must be positive".into()));
        }
        if input.discount_type == DiscountType::Percentage && input.value > 100 {
            return Err(ShopError::Validation("A percentage discount cannot exceed 100".into()));
        }
        if input.min_order < 0 {
            return Err(ShopError::Validation("Minimum order must not be negative".into()));
        }
        if input.max_uses.is_some_and(|m| m < 1) {
            return Err(ShopError::Validation("Maximum uses must be at least 1".into()));
        }

        let mut promo = PromoCode::create(code, input.discount_type, input.value);
        promo.description = non_blank(input.description.as_deref());
        promo.min_order = input.min_order;
        promo.max_uses = input.max_uses;
        promo.expires_at = input.expires_at;
        self.store.insert_promo(&promo).await?;
        tracing::info!(promo_id = %promo.id, code = %promo.code, kind = %promo.discount_type, value = promo.value, "promo code created");
        Ok(promo)
    }

    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<()> {
        caller.require_admin()?;
        if !self.store.delete_promo(id).await? {
            return Err(ShopError::NotFound("Promo code"));
        }
        tracing::info!(promo_id = %id, "promo code deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (PromoService, Caller) {
        (PromoService::new(Arc::new(MemoryStore::new())), Caller::admin(Uuid::now_v7()))
    }

    #[tokio::test]
    async fn test_validate_is_case_insensitive_and_read_only() {
        let (svc, admin) = service();
        svc.create(&admin, NewPromo { code: "save10".into(), value: 10, ..Default::default() }).await.unwrap();

        let applied = svc.validate(" Save10 ", 10_000).await.unwrap();
        assert_eq!(applied.code.as_str(), "SAVE10");
        assert_eq!(applied.discount, 1_000);
        svc.validate("SAVE10", 10_000).await.unwrap();
        assert_eq!(svc.list(&admin).await.unwrap()[0].used_count, 0);
    }

    #[tokio::test]
    async fn test_validate_huge_total() {
        let (svc, admin) = service();
        svc.create(&admin, NewPromo { code: "TEN".into(), value: 10, ..Default::default() }).await.unwrap();
        let applied = svc.validate("TEN", 4_000_000_000_000_000_000).await.unwrap();
        assert_eq!(applied.discount, 400_000_000_000_000_000);
    }

    #[tokio::test]
    async fn test_validate_rejections() {
        let (svc, admin) = service();
        let err = svc.validate("NOPE", 100).await.unwrap_err();
        assert!(matches!(err, ShopError::Promo(PromoRejection::NotFound)));

        svc.create(&admin, NewPromo { code: "BIG".into(), discount_type: DiscountType::Fixed, value: 500, min_order: 5_000, ..Default::default() })
            .await
            .unwrap();
        let err = svc.validate("big", 4_999).await.unwrap_err();
        assert!(err.to_string().contains("5000"));
        assert_eq!(svc.validate("big", 5_000).await.unwrap().discount, 500);
    }

    #[tokio::test]
    async fn test_create_rules() {
        let (svc, admin) = service();
        let too_much = NewPromo { code: "X".into(), value: 150, ..Default::default() };
        assert!(matches!(svc.create(&admin, too_much).await, Err(ShopError::Validation(_))));

        let ok = NewPromo { code: "dup".into(), value: 5, ..Default::default() };
        svc.create(&admin, ok.clone()).await.unwrap();
        assert!(matches!(svc.create(&admin, ok).await, Err(ShopError::Conflict(_))));

        let customer = Caller::customer(Uuid::now_v7());
        assert!(matches!(svc.list(&customer).await, Err(ShopError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let (svc, admin) = service();
        let p = svc.create(&admin, NewPromo { code: "GONE".into(), value: 5, ..Default::default() }).await.unwrap();
        svc.delete(&admin, p.id).await.unwrap();
        assert!(matches!(svc.delete(&admin, p.id).await, Err(ShopError::NotFound(_))));
    }
}
