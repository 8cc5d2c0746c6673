use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::chat::Chat;
use crate::error::DomainError;
use crate::ports::chat::ChatRepository;
use crate::util::{now_ms, uuid_v7_without_dashes};

pub const MAX_CONTENT_LENGTH: usize = 2_000;
pub const MAX_HISTORY_PAGE: usize = 200;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            "file" => Some(MessageKind::File),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub read_receipts: Vec<ReadReceipt>,
    pub created_at_ms: i64,
}

impl Message {
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_receipts
            .iter()
            .any(|receipt| receipt.user_id == user_id)
    }

    /// History ordering key.
    pub fn sort_key(&self) -> (i64, &str) {
        (self.created_at_ms, self.message_id.as_str())
    }
}

/// Window over a chat's history. The default cursor covers the whole history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    pub since_created_at_ms: Option<i64>,
    pub since_message_id: Option<String>,
    pub limit: Option<usize>,
}

impl HistoryCursor {
    pub fn full() -> Self {
        Self::default()
    }

    /// Messages strictly after `(since_created_at_ms, since_message_id)`, at most
    /// `limit` of them (clamped to `1..=MAX_HISTORY_PAGE`).
    pub fn page(
        since_created_at_ms: Option<i64>,
        since_message_id: Option<String>,
        limit: Option<usize>,
    ) -> DomainResult<Self> {
        if since_message_id.is_some() && since_created_at_ms.is_none() {
            return Err(DomainError::Validation(
                "since_message_id requires since_created_at_ms".into(),
            ));
        }
        Ok(Self {
            since_created_at_ms,
            since_message_id,
            limit: limit.map(|limit| limit.clamp(1, MAX_HISTORY_PAGE)),
        })
    }

    pub fn admits(&self, message: &Message) -> bool {
        let Some(since) = self.since_created_at_ms else {
            return true;
        };
        match self.since_message_id.as_deref() {
            Some(since_id) => message.sort_key() > (since, since_id),
            None => message.created_at_ms > since,
        }
    }

    /// Orders, filters and truncates an unordered set of a chat's messages.
    pub fn apply(&self, mut messages: Vec<Message>) -> Vec<Message> {
        messages.retain(|message| self.admits(message));
        messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if let Some(limit) = self.limit {
            messages.truncate(limit);
        }
        messages
    }
}

pub fn validate_content(content: &str) -> DomainResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation("message content is required".into()));
    }
    if trimmed.chars().count() > MAX_CONTENT_LENGTH {
        return Err(DomainError::Validation(format!(
            "message content exceeds {MAX_CONTENT_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct MessageStore {
    chats: Arc<dyn ChatRepository>,
}

impl MessageStore {
    pub fn new(chats: Arc<dyn ChatRepository>) -> Self {
        Self { chats }
    }

    /// Loads the chat and checks that `user_id` participates in it.
    pub async fn authorize(&self, chat_id: &str, user_id: &str) -> DomainResult<Chat> {
        let chat = self
            .chats
            .get_chat(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)?;
        if !chat.is_participant(user_id) {
            return Err(DomainError::NotParticipant);
        }
        Ok(chat)
    }

    pub async fn append(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> DomainResult<Message> {
        let chat = self.authorize(chat_id, sender_id).await?;
        let content = validate_content(content)?;

        let now = now_ms();
        let message = Message {
            message_id: uuid_v7_without_dashes(),
            chat_id: chat.chat_id,
            sender_id: sender_id.to_string(),
            content,
            kind,
            read_receipts: vec![ReadReceipt {
                user_id: sender_id.to_string(),
                read_at_ms: now,
            }],
            created_at_ms: now,
        };
        let message = self.chats.create_message(&message).await?;
        self.chats
            .advance_last_message(&message.chat_id, &message.message_id, message.created_at_ms)
            .await?;

        tracing::debug!(
            chat_id = %message.chat_id,
            message_id = %message.message_id,
            sender_id = %message.sender_id,
            kind = message.kind.as_str(),
            "message appended"
        );
        Ok(message)
    }

    pub async fn history(
        &self,
        chat_id: &str,
        requesting_user_id: &str,
        cursor: &HistoryCursor,
    ) -> DomainResult<Vec<Message>> {
        let chat = self.authorize(chat_id, requesting_user_id).await?;
        self.chats.list_messages(&chat.chat_id, cursor).await
    }

    pub async fn mark_read(&self, chat_id: &str, user_id: &str) -> DomainResult<usize> {
        let chat = self.authorize(chat_id, user_id).await?;
        let marked = self.chats.mark_read(&chat.chat_id, user_id, now_ms()).await?;
        if marked > 0 {
            tracing::debug!(chat_id = %chat.chat_id, user_id, marked, "messages marked read");
        }
        Ok(marked)
    }
}
