use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{AppState, MaybeCaller, Path, Query, ValidJson};
use crate::domain::aggregates::{CheckoutLine, CustomerContact, Order, OrderStatus, PaymentStatus};
use crate::services::{Caller, PlaceOrder, PromoRef, StatusUpdate};
use crate::{Result, ShopError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub customer_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub customer_phone: String,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000000000, message = "Delivery cost must be between 0 and 1000000000000"))]
    pub delivery_cost: i64,
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderLineRequest>,
    pub promo_code_id: Option<Uuid>,
    pub promo_code: Option<String>,
    #[validate(range(min = 0, max = 1000000000000, message = "Discount must be between 0 and 1000000000000"))]
    pub discount: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub needs_refund: bool,
    pub restored_stock: bool,
    pub order: Order,
}

pub async fn create_order(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    ValidJson(req): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let promo = match (req.promo_code_id, req.promo_code) {
        (Some(id), _) => Some(PromoRef::Id(id)),
        (None, Some(code)) if !code.trim().is_empty() => Some(PromoRef::Code(code)),
        _ => None,
    };
    let place = PlaceOrder {
        customer: CustomerContact {
            name: req.customer_name.trim().to_string(),
            email: req.customer_email.trim().to_string(),
            phone: req.customer_phone.trim().to_string(),
            delivery_address: req.delivery_address.trim().to_string(),
        },
        delivery_cost: req.delivery_cost,
        lines: req.items.iter().map(|i| CheckoutLine { product_id: i.product_id, quantity: i.quantity }).collect(),
        promo,
        client_discount: req.discount,
        notes: req.notes,
    };
    let order = state.orders.place(caller.map(|c| c.user_id), place).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(q): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let status = q
        .status
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<OrderStatus>())
        .transpose()
        .map_err(ShopError::Validation)?;
    Ok(Json(state.orders.list(&caller, status).await?))
}

pub async fn get_order(State(state): State<AppState>, caller: Caller, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(state.orders.get(&caller, id).await?))
}

pub async fn update_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateOrderRequest>,
) -> Result<Json<StatusUpdate>> {
    Ok(Json(state.orders.update(&caller, id, req.status, req.payment_status).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>> {
    let outcome = state.orders.cancel(&caller, id).await?;
    Ok(Json(CancelResponse {
        success: true,
        needs_refund: outcome.needs_refund,
        restored_stock: outcome.restored_stock,
        order: outcome.order,
    }))
}
