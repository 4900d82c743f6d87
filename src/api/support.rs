use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{AppState, Path, ValidJson};
use crate::domain::aggregates::SupportMessage;
use crate::services::{Caller, ChatView};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: Option<Uuid>,
    #[validate(length(min = 1, max = 4000, message = "Message must not be empty"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminReplyRequest {
    pub chat_id: Uuid,
    #[validate(length(min = 1, max = 4000, message = "Message must not be empty"))]
    pub content: String,
}

pub async fn my_chat(State(state): State<AppState>, caller: Caller) -> Result<Json<ChatView>> {
    Ok(Json(state.support.my_chat(&caller).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<Json<SupportMessage>> {
    Ok(Json(state.support.send(&caller, req.chat_id, &req.content).await?))
}

pub async fn get_chat(State(state): State<AppState>, caller: Caller, Path(chat_id): Path<Uuid>) -> Result<Json<ChatView>> {
    Ok(Json(state.support.chat(&caller, chat_id).await?))
}

pub async fn all_chats(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<ChatView>>> {
    Ok(Json(state.support.all_chats(&caller).await?))
}

pub async fn admin_reply(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(req): ValidJson<AdminReplyRequest>,
) -> Result<Json<SupportMessage>> {
    Ok(Json(state.support.reply(&caller, req.chat_id, &req.content).await?))
}
