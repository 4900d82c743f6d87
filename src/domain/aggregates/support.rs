//! Support Chat Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus { #[default] Open, Closed }

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Open => "open", Self::Closed => "closed" }
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ChatStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown chat status {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportChat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: ChatStatus,
    /// Oldest first.
    pub messages: Vec<SupportMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Which side of the conversation wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Author { Customer, Staff }

impl SupportChat {
    pub fn open(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, status: ChatStatus::Open, messages: vec![], created_at: now, updated_at: now }
    }

    pub fn is_open(&self) -> bool { self.status == ChatStatus::Open }

    /// Appends a message, keeping the log in creation order.
    pub fn post(&mut self, content: &str, author: Author) -> SupportMessage {
        let mut created_at = Utc::now();
        if let Some(last) = self.messages.last() {
            if created_at < last.created_at { created_at = last.created_at; }
        }
        let message = SupportMessage {
            id: Uuid::now_v7(), chat_id: self.id, content: content.trim().to_string(),
            is_admin: author == Author::Staff, created_at,
        };
        self.messages.push(message.clone());
        self.updated_at = created_at;
        message
    }

    pub fn last_message(&self) -> Option<&SupportMessage> { self.messages.last() }
}
