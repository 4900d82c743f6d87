//! Support chat: one open conversation per customer, polled by clients.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::aggregates::{Author, SupportChat, SupportMessage};
use crate::domain::events::{DomainEvent, SupportEvent};
use crate::domain::value_objects::non_blank;
use crate::services::{Caller, EventPublisher};
use crate::store::Store;
use crate::{Result, ShopError};

/// A chat together with how often clients should poll it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: SupportChat,
    pub poll_interval_secs: u64,
}

#[derive(Clone)]
pub struct SupportService {
    store: Arc<dyn Store>,
    events: EventPublisher,
    poll_interval: Duration,
}

impl SupportService {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, poll_interval: Duration) -> Self {
        Self { store, events, poll_interval }
    }

    fn view(&self, chat: SupportChat) -> ChatView {
        ChatView { chat, poll_interval_secs: self.poll_interval.as_secs() }
    }

    /// The caller's open chat, created on first request.
    pub async fn my_chat(&self, caller: &Caller) -> Result<ChatView> {
        let chat = self.store.open_chat(caller.user_id).await?;
        Ok(self.view(chat))
    }

    /// Customer message. Without a `chat_id` it goes to the caller's open chat; a
    /// chat owned by someone else is reported as missing.
    pub async fn send(&self, caller: &Caller, chat_id: Option<Uuid>, content: &str) -> Result<SupportMessage> {
        let content = message_text(content)?;
        let chat_id = match chat_id {
            Some(id) => match self.store.chat(id).await? {
                Some(chat) if chat.user_id == caller.user_id => chat.id,
                _ => return Err(ShopError::NotFound("Chat")),
            },
            None => self.store.open_chat(caller.user_id).await?.id,
        };
        self.post(chat_id, &content, Author::Customer).await
    }

    pub async fn chat(&self, caller: &Caller, id: Uuid) -> Result<ChatView> {
        let chat = self.store.chat(id).await?.ok_or(ShopError::NotFound("Chat"))?;
        if !caller.is_admin() && chat.user_id != caller.user_id {
            return Err(ShopError::forbidden());
        }
        Ok(self.view(chat))
    }

    /// Staff inbox: latest activity first, one message preview per chat.
    pub async fn all_chats(&self, caller: &Caller) -> Result<Vec<ChatView>> {
        caller.require_admin()?;
        let chats = self.store.chats().await?;
        Ok(chats.into_iter().map(|c| self.view(c)).collect())
    }

    /// Staff message into an existing chat.
    pub async fn reply(&self, caller: &Caller, chat_id: Uuid, content: &str) -> Result<SupportMessage> {
        caller.require_admin()?;
        let content = message_text(content)?;
        self.post(chat_id, &content, Author::Staff).await
    }

    async fn post(&self, chat_id: Uuid, content: &str, author: Author) -> Result<SupportMessage> {
        let message = self.store.post_message(chat_id, content, author).await?.ok_or(ShopError::NotFound("Chat"))?;
        tracing::debug!(%chat_id, message_id = %message.id, from_staff = message.is_admin, "support message posted");
        self.events
            .publish(DomainEvent::Support(SupportEvent::MessagePosted {
                chat_id,
                message_id: message.id,
                from_staff: message.is_admin,
            }))
            .await;
        Ok(message)
    }
}

fn message_text(content: &str) -> Result<String> {
    non_blank(Some(content)).ok_or_else(|| ShopError::Validation("Message must not be empty".into()))
}
