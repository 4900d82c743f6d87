use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{AppState, Path, ValidJson};
use crate::domain::aggregates::{AppliedPromo, DiscountType, PromoCode};
use crate::services::{Caller, NewPromo};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoRequest {
    #[validate(length(min = 1, message = "Promo code is required"))]
    pub code: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000000000, message = "Order total must be between 0 and 1000000000000"))]
    pub order_total: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromoRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1 to 50 characters"))]
    pub code: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "Discount value must be positive"))]
    pub value: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_order: i64,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn validate_promo(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ValidatePromoRequest>,
) -> Result<Json<AppliedPromo>> {
    Ok(Json(state.promos.validate(&req.code, req.order_total).await?))
}

pub async fn list_promos(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<PromoCode>>> {
    Ok(Json(state.promos.list(&caller).await?))
}

pub async fn create_promo(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(req): ValidJson<CreatePromoRequest>,
) -> Result<(StatusCode, Json<PromoCode>)> {
    let promo = state
        .promos
        .create(
            &caller,
            NewPromo {
                code: req.code,
                description: req.description,
                discount_type: req.discount_type,
                value: req.value,
                min_order: req.min_order,
                max_uses: req.max_uses,
                expires_at: req.expires_at,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

pub async fn delete_promo(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    state.promos.delete(&caller, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
