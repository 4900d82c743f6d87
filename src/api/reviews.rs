use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{AppState, Path, Query, ValidJson};
use crate::domain::aggregates::Review;
use crate::services::Caller;
use crate::{Result, ShopError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReviewsQuery {
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, max = 5000, message = "Comment is required"))]
    pub comment: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    #[validate(length(min = 1, message = "Reply must not be empty"))]
    pub admin_reply: String,
}

pub async fn list_reviews(State(state): State<AppState>, Query(q): Query<ListReviewsQuery>) -> Result<Json<Vec<Review>>> {
    let product_id = q.product_id.ok_or_else(|| ShopError::Validation("productId is required".into()))?;
    Ok(Json(state.reviews.list(product_id).await?))
}

pub async fn create_review(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(req): ValidJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state.reviews.submit(&caller, req.product_id, req.rating, &req.comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn reply_to_review(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<ReplyRequest>,
) -> Result<Json<Review>> {
    Ok(Json(state.reviews.reply(&caller, id, &req.admin_reply).await?))
}
