use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::messages::Message;
use crate::ports::chat::ChatRepository;
use crate::ports::trips::TripRepository;
use crate::util::{now_ms, uuid_v7_without_dashes};

const MIN_PARTICIPANTS: usize = 2;

/// Chat flavour. Group chats always carry their display name and originating trip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group { name: String, trip_id: String },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub chat_id: String,
    #[serde(flatten)]
    pub kind: ChatKind,
    pub participant_ids: Vec<String>,
    pub last_message_id: Option<String>,
    pub last_message_at_ms: i64,
    pub created_at_ms: i64,
}

impl Chat {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participant_ids.iter().any(|id| id == user_id)
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ChatKind::Group { name, .. } => Some(name),
            ChatKind::Private => None,
        }
    }

    pub fn trip_id(&self) -> Option<&str> {
        match &self.kind {
            ChatKind::Group { trip_id, .. } => Some(trip_id),
            ChatKind::Private => None,
        }
    }

    /// Uniqueness key of a private chat; `None` for group chats.
    pub fn pair_key(&self) -> Option<String> {
        match (&self.kind, self.participant_ids.as_slice()) {
            (ChatKind::Private, [first, second]) => Some(private_pair_key(first, second)),
            _ => None,
        }
    }
}

/// Order-independent key for a pair of users.
///
/// The lower id is length-prefixed so ids containing `:` cannot collide.
pub fn private_pair_key(first: &str, second: &str) -> String {
    let (low, high) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    format!("{}:{low}:{high}", low.len())
}

fn normalize_participants<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut ids: Vec<String> = ids
        .into_iter()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Resolves or lazily creates the canonical chat for a pair of users or a trip.
#[derive(Clone)]
pub struct ChatDirectory {
    chats: Arc<dyn ChatRepository>,
    trips: Arc<dyn TripRepository>,
}

impl ChatDirectory {
    pub fn new(chats: Arc<dyn ChatRepository>, trips: Arc<dyn TripRepository>) -> Self {
        Self { chats, trips }
    }

    pub async fn get_or_create_private_chat(
        &self,
        current_user_id: &str,
        other_user_id: &str,
    ) -> DomainResult<Chat> {
        let current_user_id = current_user_id.trim();
        let other_user_id = other_user_id.trim();
        if current_user_id.is_empty() || other_user_id.is_empty() {
            return Err(DomainError::Validation("user_id is required".into()));
        }
        if current_user_id == other_user_id {
            return Err(DomainError::SelfChat);
        }

        let pair_key = private_pair_key(current_user_id, other_user_id);
        if let Some(chat) = self.chats.find_private_chat(&pair_key).await? {
            return Ok(chat);
        }

        let now = now_ms();
        let chat = Chat {
            chat_id: uuid_v7_without_dashes(),
            kind: ChatKind::Private,
            participant_ids: normalize_participants([current_user_id, other_user_id]),
            last_message_id: None,
            last_message_at_ms: now,
            created_at_ms: now,
        };

        match self.chats.create_chat(&chat).await {
            Ok(chat) => {
                tracing::info!(chat_id = %chat.chat_id, "private chat created");
                Ok(chat)
            }
            // Lost a creation race against the other participant.
            Err(DomainError::Conflict) => self
                .chats
                .find_private_chat(&pair_key)
                .await?
                .ok_or(DomainError::Conflict),
            Err(err) => Err(err),
        }
    }

    /// Participants are the trip's member list at creation time. Members who join the
    /// trip afterwards are not added to an existing group chat.
    pub async fn get_or_create_group_chat(
        &self,
        trip_id: &str,
        requesting_user_id: &str,
    ) -> DomainResult<Chat> {
        let trip = self
            .trips
            .get_trip(trip_id)
            .await?
            .ok_or(DomainError::TripNotFound)?;
        if !trip.has_member(requesting_user_id) {
            return Err(DomainError::NotTripMember);
        }

        if let Some(chat) = self.chats.find_group_chat(&trip.trip_id).await? {
            return Ok(chat);
        }

        let participant_ids = normalize_participants(trip.member_ids.iter().map(String::as_str));
        if participant_ids.len() < MIN_PARTICIPANTS {
            return Err(DomainError::Validation(
                "a group chat needs at least two trip members".into(),
            ));
        }

        let now = now_ms();
        let chat = Chat {
            chat_id: uuid_v7_without_dashes(),
            kind: ChatKind::Group {
                name: format!("{} Chat", trip.name),
                trip_id: trip.trip_id.clone(),
            },
            participant_ids,
            last_message_id: None,
            last_message_at_ms: now,
            created_at_ms: now,
        };

        match self.chats.create_chat(&chat).await {
            Ok(chat) => {
                tracing::info!(
                    chat_id = %chat.chat_id,
                    trip_id = %trip.trip_id,
                    participants = chat.participant_ids.len(),
                    "group chat created"
                );
                Ok(chat)
            }
            Err(DomainError::Conflict) => self
                .chats
                .find_group_chat(&trip.trip_id)
                .await?
                .ok_or(DomainError::Conflict),
            Err(err) => Err(err),
        }
    }

    pub async fn get_chat(&self, chat_id: &str) -> DomainResult<Chat> {
        self.chats
            .get_chat(chat_id)
            .await?
            .ok_or(DomainError::ChatNotFound)
    }

    pub async fn list_user_chats(&self, user_id: &str) -> DomainResult<Vec<Chat>> {
        let mut chats = self.chats.list_chats_for_user(user_id).await?;
        chats.sort_by(|a, b| {
            b.last_message_at_ms
                .cmp(&a.last_message_at_ms)
                .then_with(|| b.chat_id.cmp(&a.chat_id))
        });
        Ok(chats)
    }

    pub async fn last_message(&self, chat: &Chat) -> DomainResult<Option<Message>> {
        let Some(message_id) = chat.last_message_id.as_deref() else {
            return Ok(None);
        };
        self.chats.get_message(&chat.chat_id, message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_key_ignores_argument_order() {
        assert_eq!(private_pair_key("alice", "bob"), private_pair_key("bob", "alice"));
        assert_eq!(private_pair_key("alice", "bob"), "5:alice:bob");
    }

    #[test]
    fn pair_key_distinguishes_ids_containing_separators() {
        assert_ne!(private_pair_key("a:b", "c"), private_pair_key("a", "b:c"));
    }

    #[test]
    fn participants_are_sorted_and_unique() {
        let ids = normalize_participants(["u-3", " u-1 ", "u-3", "", "u-2"]);
        assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);
    }

    #[test]
    fn group_chat_serializes_kind_inline() {
        let chat = Chat {
            chat_id: "c-1".to_string(),
            kind: ChatKind::Group {
                name: "Bali Chat".to_string(),
                trip_id: "t-1".to_string(),
            },
            participant_ids: vec!["a".to_string(), "b".to_string()],
            last_message_id: None,
            last_message_at_ms: 10,
            created_at_ms: 10,
        };
        let value = serde_json::to_value(&chat).expect("json");
        assert_eq!(value.get("type"), Some(&json!("group")));
        assert_eq!(value.get("name"), Some(&json!("Bali Chat")));
        assert_eq!(value.get("trip_id"), Some(&json!("t-1")));
        assert_eq!(chat.pair_key(), None);

        let decoded: Chat = serde_json::from_value(value).expect("decode");
        assert_eq!(decoded, chat);
    }

    #[test]
    fn private_chat_exposes_pair_key() {
        let chat = Chat {
            chat_id: "c-2".to_string(),
            kind: ChatKind::Private,
            participant_ids: vec!["a".to_string(), "b".to_string()],
            last_message_id: None,
            last_message_at_ms: 0,
            created_at_ms: 0,
        };
        assert_eq!(chat.pair_key().as_deref(), Some("1:a:b"));
        assert!(chat.is_participant("b"));
        assert!(!chat.is_participant("c"));
        assert_eq!(chat.name(), None);
    }
}
