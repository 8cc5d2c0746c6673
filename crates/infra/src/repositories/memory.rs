use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tripmate_domain::DomainResult;
use tripmate_domain::chat::{Chat, ChatKind};
use tripmate_domain::error::DomainError;
use tripmate_domain::identity::UserProfile;
use tripmate_domain::messages::{HistoryCursor, Message, ReadReceipt};
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::ports::chat::ChatRepository;
use tripmate_domain::ports::trips::TripRepository;
use tripmate_domain::ports::users::UserRepository;
use tripmate_domain::trips::Trip;

#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: Arc<RwLock<HashMap<String, Chat>>>,
    messages: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn violates_uniqueness(existing: &Chat, candidate: &Chat) -> bool {
        if existing.chat_id == candidate.chat_id {
            return true;
        }
        match (&existing.kind, &candidate.kind) {
            (ChatKind::Private, ChatKind::Private) => existing.pair_key() == candidate.pair_key(),
            (ChatKind::Group { trip_id: left, .. }, ChatKind::Group { trip_id: right, .. }) => {
                left == right
            }
            _ => false,
        }
    }
}

impl ChatRepository for InMemoryChatRepository {
    fn get_chat(&self, chat_id: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let chat_id = chat_id.to_string();
        let chats = self.chats.clone();
        Box::pin(async move { Ok(chats.read().await.get(&chat_id).cloned()) })
    }

    fn find_private_chat(&self, pair_key: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let pair_key = pair_key.to_string();
        let chats = self.chats.clone();
        Box::pin(async move {
            Ok(chats
                .read()
                .await
                .values()
                .find(|chat| chat.pair_key().as_deref() == Some(pair_key.as_str()))
                .cloned())
        })
    }

    fn find_group_chat(&self, trip_id: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let trip_id = trip_id.to_string();
        let chats = self.chats.clone();
        Box::pin(async move {
            Ok(chats
                .read()
                .await
                .values()
                .find(|chat| chat.trip_id() == Some(trip_id.as_str()))
                .cloned())
        })
    }

    fn create_chat(&self, chat: &Chat) -> BoxFuture<'_, DomainResult<Chat>> {
        let chat = chat.clone();
        let chats = self.chats.clone();
        Box::pin(async move {
            let mut chats = chats.write().await;
            if chats
                .values()
                .any(|existing| Self::violates_uniqueness(existing, &chat))
            {
                return Err(DomainError::Conflict);
            }
            chats.insert(chat.chat_id.clone(), chat.clone());
            Ok(chat)
        })
    }

    fn list_chats_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Chat>>> {
        let user_id = user_id.to_string();
        let chats = self.chats.clone();
        Box::pin(async move {
            let mut output: Vec<Chat> = chats
                .read()
                .await
                .values()
                .filter(|chat| chat.is_participant(&user_id))
                .cloned()
                .collect();
            output.sort_by(|a, b| {
                b.last_message_at_ms
                    .cmp(&a.last_message_at_ms)
                    .then_with(|| b.chat_id.cmp(&a.chat_id))
            });
            Ok(output)
        })
    }

    fn advance_last_message(
        &self,
        chat_id: &str,
        message_id: &str,
        at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let chat_id = chat_id.to_string();
        let message_id = message_id.to_string();
        let chats = self.chats.clone();
        Box::pin(async move {
            let mut chats = chats.write().await;
            let chat = chats.get_mut(&chat_id).ok_or(DomainError::ChatNotFound)?;
            if at_ms >= chat.last_message_at_ms {
                chat.last_message_id = Some(message_id);
                chat.last_message_at_ms = at_ms;
            }
            Ok(())
        })
    }

    fn create_message(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let message = message.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut messages = messages.write().await;
            let chat_messages = messages.entry(message.chat_id.clone()).or_default();
            if chat_messages
                .iter()
                .any(|existing| existing.message_id == message.message_id)
            {
                return Err(DomainError::Conflict);
            }
            chat_messages.push(message.clone());
            Ok(message)
        })
    }

    fn get_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> BoxFuture<'_, DomainResult<Option<Message>>> {
        let chat_id = chat_id.to_string();
        let message_id = message_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            Ok(messages.read().await.get(&chat_id).and_then(|chat_messages| {
                chat_messages
                    .iter()
                    .find(|message| message.message_id == message_id)
                    .cloned()
            }))
        })
    }

    fn list_messages(
        &self,
        chat_id: &str,
        cursor: &HistoryCursor,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let chat_id = chat_id.to_string();
        let cursor = cursor.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            let chat_messages = messages
                .read()
                .await
                .get(&chat_id)
                .cloned()
                .unwrap_or_default();
            Ok(cursor.apply(chat_messages))
        })
    }

    fn mark_read(
        &self,
        chat_id: &str,
        user_id: &str,
        read_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<usize>> {
        let chat_id = chat_id.to_string();
        let user_id = user_id.to_string();
        let messages = self.messages.clone();
        Box::pin(async move {
            let mut messages = messages.write().await;
            let Some(chat_messages) = messages.get_mut(&chat_id) else {
                return Ok(0);
            };
            let mut marked = 0;
            for message in chat_messages
                .iter_mut()
                .filter(|message| !message.is_read_by(&user_id))
            {
                message.read_receipts.push(ReadReceipt {
                    user_id: user_id.clone(),
                    read_at_ms,
                });
                marked += 1;
            }
            Ok(marked)
        })
    }
}

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: Arc<RwLock<HashMap<String, Trip>>>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TripRepository for InMemoryTripRepository {
    fn get_trip(&self, trip_id: &str) -> BoxFuture<'_, DomainResult<Option<Trip>>> {
        let trip_id = trip_id.to_string();
        let trips = self.trips.clone();
        Box::pin(async move { Ok(trips.read().await.get(&trip_id).cloned()) })
    }

    fn create_trip(&self, trip: &Trip) -> BoxFuture<'_, DomainResult<Trip>> {
        let trip = trip.clone();
        let trips = self.trips.clone();
        Box::pin(async move {
            let mut trips = trips.write().await;
            if trips.contains_key(&trip.trip_id) {
                return Err(DomainError::Conflict);
            }
            trips.insert(trip.trip_id.clone(), trip.clone());
            Ok(trip)
        })
    }

    fn add_member(&self, trip_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<Trip>> {
        let trip_id = trip_id.to_string();
        let user_id = user_id.to_string();
        let trips = self.trips.clone();
        Box::pin(async move {
            let mut trips = trips.write().await;
            let trip = trips.get_mut(&trip_id).ok_or(DomainError::TripNotFound)?;
            if trip.has_member(&user_id) {
                return Err(DomainError::AlreadyMember);
            }
            trip.member_ids.push(user_id);
            Ok(trip.clone())
        })
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn get_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let user_id = user_id.to_string();
        let users = self.users.clone();
        Box::pin(async move { Ok(users.read().await.get(&user_id).cloned()) })
    }

    fn get_users(&self, user_ids: &[String]) -> BoxFuture<'_, DomainResult<Vec<UserProfile>>> {
        let user_ids = user_ids.to_vec();
        let users = self.users.clone();
        Box::pin(async move {
            let users = users.read().await;
            Ok(user_ids
                .iter()
                .filter_map(|user_id| users.get(user_id).cloned())
                .collect())
        })
    }

    fn upsert_user(&self, user: &UserProfile) -> BoxFuture<'_, DomainResult<UserProfile>> {
        let user = user.clone();
        let users = self.users.clone();
        Box::pin(async move {
            users
                .write()
                .await
                .insert(user.user_id.clone(), user.clone());
            Ok(user)
        })
    }
}
