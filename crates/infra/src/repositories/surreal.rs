use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_value};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tripmate_domain::DomainResult;
use tripmate_domain::chat::{Chat, ChatKind};
use tripmate_domain::error::DomainError;
use tripmate_domain::identity::UserProfile;
use tripmate_domain::messages::{HistoryCursor, Message, MessageKind, ReadReceipt};
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::ports::chat::ChatRepository;
use tripmate_domain::ports::trips::TripRepository;
use tripmate_domain::ports::users::UserRepository;
use tripmate_domain::trips::Trip;

const CHAT_FIELDS: &str = "chat_id,\n\
    kind,\n\
    name,\n\
    trip_id,\n\
    participant_ids,\n\
    last_message_id,\n\
    type::string(last_message_at) AS last_message_at,\n\
    type::string(created_at) AS created_at";

const MESSAGE_FIELDS: &str = "message_id,\n\
    chat_id,\n\
    sender_id,\n\
    content,\n\
    kind,\n\
    read_receipts,\n\
    type::string(created_at) AS created_at";

fn to_rfc3339(at_ms: i64) -> DomainResult<String> {
    let instant = OffsetDateTime::from_unix_timestamp_nanos(at_ms as i128 * 1_000_000)
        .map_err(|err| DomainError::Validation(format!("invalid timestamp: {err}")))?;
    instant
        .format(&Rfc3339)
        .map_err(|err| DomainError::Validation(format!("invalid timestamp: {err}")))
}

fn parse_datetime(value: &str) -> DomainResult<i64> {
    let datetime = OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| DomainError::Storage(format!("invalid datetime: {err}")))?;
    Ok((datetime.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let error_message = err.to_string().to_lowercase();
    if error_message.contains("already exists")
        || error_message.contains("already contains")
        || error_message.contains("duplicate")
        || error_message.contains("unique")
    {
        return DomainError::Conflict;
    }
    DomainError::Storage(format!("surreal query failed: {error_message}"))
}

fn invalid_result(err: impl std::fmt::Display) -> DomainError {
    DomainError::Storage(format!("invalid query result: {err}"))
}

fn decode_rows<R, T>(
    rows: Vec<Value>,
    what: &str,
    map: fn(R) -> DomainResult<T>,
) -> DomainResult<Vec<T>>
where
    R: for<'de> Deserialize<'de>,
{
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<R>(row)
                .map_err(|err| DomainError::Storage(format!("invalid {what} row: {err}")))
                .and_then(map)
        })
        .collect()
}

fn uniqueness_key(chat: &Chat) -> DomainResult<String> {
    match &chat.kind {
        ChatKind::Private => chat
            .pair_key()
            .map(|pair_key| format!("pair:{pair_key}"))
            .ok_or_else(|| {
                DomainError::Validation("a private chat has exactly two participants".into())
            }),
        ChatKind::Group { trip_id, .. } => Ok(format!("trip:{trip_id}")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealChatRow {
    chat_id: String,
    kind: String,
    name: Option<String>,
    trip_id: Option<String>,
    participant_ids: Vec<String>,
    last_message_id: Option<String>,
    last_message_at: String,
    created_at: String,
}

impl SurrealChatRow {
    fn into_chat(self) -> DomainResult<Chat> {
        let kind = match (self.kind.as_str(), self.name, self.trip_id) {
            ("private", _, _) => ChatKind::Private,
            ("group", Some(name), Some(trip_id)) => ChatKind::Group { name, trip_id },
            (other, _, _) => {
                return Err(DomainError::Storage(format!("invalid chat kind '{other}'")));
            }
        };
        Ok(Chat {
            chat_id: self.chat_id,
            kind,
            participant_ids: self.participant_ids,
            last_message_id: self.last_message_id,
            last_message_at_ms: parse_datetime(&self.last_message_at)?,
            created_at_ms: parse_datetime(&self.created_at)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealMessageRow {
    message_id: String,
    chat_id: String,
    sender_id: String,
    content: String,
    kind: String,
    read_receipts: Vec<ReadReceipt>,
    created_at: String,
}

impl SurrealMessageRow {
    fn into_message(self) -> DomainResult<Message> {
        let kind = MessageKind::parse(&self.kind).ok_or_else(|| {
            DomainError::Storage(format!("invalid message kind '{}'", self.kind))
        })?;
        Ok(Message {
            message_id: self.message_id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            content: self.content,
            kind,
            read_receipts: self.read_receipts,
            created_at_ms: parse_datetime(&self.created_at)?,
        })
    }
}

#[derive(Clone)]
pub struct SurrealChatRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealChatRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_chats(rows: Vec<Value>) -> DomainResult<Vec<Chat>> {
        decode_rows(rows, "chat", SurrealChatRow::into_chat)
    }

    fn decode_messages(rows: Vec<Value>) -> DomainResult<Vec<Message>> {
        decode_rows(rows, "chat message", SurrealMessageRow::into_message)
    }

    async fn find_by_uniqueness_key(
        client: Arc<Surreal<Client>>,
        key: String,
    ) -> DomainResult<Option<Chat>> {
        let mut response = client
            .query(format!(
                "SELECT {CHAT_FIELDS} FROM chat WHERE uniqueness_key = $key LIMIT 1"
            ))
            .bind(("key", key))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
        Ok(Self::decode_chats(rows)?.into_iter().next())
    }
}

impl ChatRepository for SurrealChatRepository {
    fn get_chat(&self, chat_id: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let chat_id = chat_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {CHAT_FIELDS} FROM chat WHERE chat_id = $chat_id LIMIT 1"
                ))
                .bind(("chat_id", chat_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(Self::decode_chats(rows)?.into_iter().next())
        })
    }

    fn find_private_chat(&self, pair_key: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let key = format!("pair:{pair_key}");
        let client = self.client.clone();
        Box::pin(Self::find_by_uniqueness_key(client, key))
    }

    fn find_group_chat(&self, trip_id: &str) -> BoxFuture<'_, DomainResult<Option<Chat>>> {
        let key = format!("trip:{trip_id}");
        let client = self.client.clone();
        Box::pin(Self::find_by_uniqueness_key(client, key))
    }

    fn create_chat(&self, chat: &Chat) -> BoxFuture<'_, DomainResult<Chat>> {
        let prepared = uniqueness_key(chat).and_then(|key| {
            Ok((
                key,
                to_rfc3339(chat.created_at_ms)?,
                to_rfc3339(chat.last_message_at_ms)?,
            ))
        });
        let client = self.client.clone();
        let chat = chat.clone();
        Box::pin(async move {
            let (key, created_at, last_message_at) = prepared?;
            let (kind, name, trip_id) = match &chat.kind {
                ChatKind::Private => ("private", None, None),
                ChatKind::Group { name, trip_id } => {
                    ("group", Some(name.clone()), Some(trip_id.clone()))
                }
            };
            client
                .query(
                    "CREATE type::record('chat', $chat_id) CONTENT {\n\
                        chat_id: $chat_id,\n\
                        uniqueness_key: $key,\n\
                        kind: $kind,\n\
                        name: $name,\n\
                        trip_id: $trip_id,\n\
                        participant_ids: $participant_ids,\n\
                        last_message_id: NONE,\n\
                        last_message_at: <datetime>$last_message_at,\n\
                        created_at: <datetime>$created_at\n\
                    };",
                )
                .bind(("chat_id", chat.chat_id.clone()))
                .bind(("key", key))
                .bind(("kind", kind))
                .bind(("name", name))
                .bind(("trip_id", trip_id))
                .bind(("participant_ids", chat.participant_ids.clone()))
                .bind(("last_message_at", last_message_at))
                .bind(("created_at", created_at))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(chat)
        })
    }

    fn list_chats_for_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Chat>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {CHAT_FIELDS} FROM chat\n\
                     WHERE participant_ids CONTAINS $user_id\n\
                     ORDER BY last_message_at DESC, chat_id DESC"
                ))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Self::decode_chats(rows)
        })
    }

    fn advance_last_message(
        &self,
        chat_id: &str,
        message_id: &str,
        at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let at = to_rfc3339(at_ms);
        let chat_id = chat_id.to_string();
        let message_id = message_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let at = at?;
            client
                .query(
                    "UPDATE chat SET\n\
                        last_message_id = $message_id,\n\
                        last_message_at = <datetime>$at\n\
                     WHERE chat_id = $chat_id AND last_message_at <= <datetime>$at;",
                )
                .bind(("chat_id", chat_id))
                .bind(("message_id", message_id))
                .bind(("at", at))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }

    fn create_message(&self, message: &Message) -> BoxFuture<'_, DomainResult<Message>> {
        let created_at = to_rfc3339(message.created_at_ms);
        let client = self.client.clone();
        let message = message.clone();
        Box::pin(async move {
            let created_at = created_at?;
            let read_receipts = to_value(&message.read_receipts)
                .map_err(|err| DomainError::Validation(format!("invalid read receipts: {err}")))?;
            client
                .query(
                    "CREATE type::record('chat_message', $message_id) CONTENT {\n\
                        message_id: $message_id,\n\
                        chat_id: $chat_id,\n\
                        sender_id: $sender_id,\n\
                        content: $content,\n\
                        kind: $kind,\n\
                        read_receipts: $read_receipts,\n\
                        created_at: <datetime>$created_at\n\
                    };",
                )
                .bind(("message_id", message.message_id.clone()))
                .bind(("chat_id", message.chat_id.clone()))
                .bind(("sender_id", message.sender_id.clone()))
                .bind(("content", message.content.clone()))
                .bind(("kind", message.kind.as_str()))
                .bind(("read_receipts", read_receipts))
                .bind(("created_at", created_at))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
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
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {MESSAGE_FIELDS} FROM chat_message\n\
                     WHERE chat_id = $chat_id AND message_id = $message_id\n\
                     LIMIT 1"
                ))
                .bind(("chat_id", chat_id))
                .bind(("message_id", message_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(Self::decode_messages(rows)?.into_iter().next())
        })
    }

    fn list_messages(
        &self,
        chat_id: &str,
        cursor: &HistoryCursor,
    ) -> BoxFuture<'_, DomainResult<Vec<Message>>> {
        let chat_id = chat_id.to_string();
        let cursor = cursor.clone();
        let threshold = cursor.since_created_at_ms.map(to_rfc3339).transpose();
        let client = self.client.clone();
        Box::pin(async move {
            let threshold = threshold?;
            let mut statement =
                format!("SELECT {MESSAGE_FIELDS} FROM chat_message WHERE chat_id = $chat_id");
            match (&threshold, &cursor.since_message_id) {
                (Some(_), Some(_)) => statement.push_str(
                    " AND (created_at > <datetime>$threshold OR (created_at = <datetime>$threshold AND message_id > $since_message_id))",
                ),
                (Some(_), None) => statement.push_str(" AND created_at > <datetime>$threshold"),
                _ => {}
            }
            statement.push_str(" ORDER BY created_at ASC, message_id ASC");
            if cursor.limit.is_some() {
                statement.push_str(" LIMIT $limit");
            }

            let mut query = client.query(statement).bind(("chat_id", chat_id));
            if let Some(threshold) = threshold {
                query = query.bind(("threshold", threshold));
            }
            if let Some(since_message_id) = cursor.since_message_id.clone() {
                query = query.bind(("since_message_id", since_message_id));
            }
            if let Some(limit) = cursor.limit {
                query = query.bind(("limit", limit as i64));
            }
            let mut response = query.await.map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            // Datetime precision in the store is finer than ours; reapply the domain order.
            Ok(cursor.apply(Self::decode_messages(rows)?))
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
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "UPDATE chat_message SET\n\
                        read_receipts += { user_id: $user_id, read_at_ms: $read_at_ms }\n\
                     WHERE chat_id = $chat_id AND read_receipts.user_id CONTAINSNOT $user_id\n\
                     RETURN message_id;",
                )
                .bind(("chat_id", chat_id))
                .bind(("user_id", user_id))
                .bind(("read_at_ms", read_at_ms))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(rows.len())
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealTripRow {
    trip_id: String,
    name: String,
    destination: String,
    created_by: String,
    member_ids: Vec<String>,
}

impl SurrealTripRow {
    fn into_trip(self) -> DomainResult<Trip> {
        Ok(Trip {
            trip_id: self.trip_id,
            name: self.name,
            destination: self.destination,
            created_by: self.created_by,
            member_ids: self.member_ids,
        })
    }
}

#[derive(Clone)]
pub struct SurrealTripRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealTripRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    async fn fetch(client: &Surreal<Client>, trip_id: String) -> DomainResult<Option<Trip>> {
        let mut response = client
            .query(
                "SELECT trip_id, name, destination, created_by, member_ids\n\
                 FROM trip WHERE trip_id = $trip_id LIMIT 1",
            )
            .bind(("trip_id", trip_id))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
        Ok(decode_rows(rows, "trip", SurrealTripRow::into_trip)?
            .into_iter()
            .next())
    }
}

impl TripRepository for SurrealTripRepository {
    fn get_trip(&self, trip_id: &str) -> BoxFuture<'_, DomainResult<Option<Trip>>> {
        let trip_id = trip_id.to_string();
        let client = self.client.clone();
        Box::pin(async move { Self::fetch(&client, trip_id).await })
    }

    fn create_trip(&self, trip: &Trip) -> BoxFuture<'_, DomainResult<Trip>> {
        let trip = trip.clone();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "CREATE type::record('trip', $trip_id) CONTENT {\n\
                        trip_id: $trip_id,\n\
                        name: $name,\n\
                        destination: $destination,\n\
                        created_by: $created_by,\n\
                        member_ids: $member_ids\n\
                    };",
                )
                .bind(("trip_id", trip.trip_id.clone()))
                .bind(("name", trip.name.clone()))
                .bind(("destination", trip.destination.clone()))
                .bind(("created_by", trip.created_by.clone()))
                .bind(("member_ids", trip.member_ids.clone()))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(trip)
        })
    }

    fn add_member(&self, trip_id: &str, user_id: &str) -> BoxFuture<'_, DomainResult<Trip>> {
        let trip_id = trip_id.to_string();
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "UPDATE trip SET member_ids += $user_id\n\
                     WHERE trip_id = $trip_id AND member_ids CONTAINSNOT $user_id\n\
                     RETURN trip_id, name, destination, created_by, member_ids;",
                )
                .bind(("trip_id", trip_id.clone()))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            if let Some(trip) = decode_rows(rows, "trip", SurrealTripRow::into_trip)?
                .into_iter()
                .next()
            {
                return Ok(trip);
            }
            match Self::fetch(&client, trip_id).await? {
                Some(_) => Err(DomainError::AlreadyMember),
                None => Err(DomainError::TripNotFound),
            }
        })
    }
}

#[derive(Clone)]
pub struct SurrealUserRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealUserRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn decode_users(rows: Vec<Value>) -> DomainResult<Vec<UserProfile>> {
        decode_rows(rows, "user", Ok)
    }
}

impl UserRepository for SurrealUserRepository {
    fn get_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
        let user_id = user_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query("SELECT user_id, name, email FROM app_user WHERE user_id = $user_id LIMIT 1")
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Ok(Self::decode_users(rows)?.into_iter().next())
        })
    }

    fn get_users(&self, user_ids: &[String]) -> BoxFuture<'_, DomainResult<Vec<UserProfile>>> {
        let user_ids = user_ids.to_vec();
        let client = self.client.clone();
        Box::pin(async move {
            if user_ids.is_empty() {
                return Ok(Vec::new());
            }
            let mut response = client
                .query("SELECT user_id, name, email FROM app_user WHERE user_id IN $user_ids")
                .bind(("user_ids", user_ids))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(invalid_result)?;
            Self::decode_users(rows)
        })
    }

    fn upsert_user(&self, user: &UserProfile) -> BoxFuture<'_, DomainResult<UserProfile>> {
        let user = user.clone();
        let client = self.client.clone();
        Box::pin(async move {
            client
                .query(
                    "UPSERT type::record('app_user', $user_id) CONTENT {\n\
                        user_id: $user_id,\n\
                        name: $name,\n\
                        email: $email\n\
                    };",
                )
                .bind(("user_id", user.user_id.clone()))
                .bind(("name", user.name.clone()))
                .bind(("email", user.email.clone()))
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(user)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_rfc3339() {
        let at_ms = 1_700_000_123_456;
        let text = to_rfc3339(at_ms).expect("format");
        assert_eq!(parse_datetime(&text).expect("parse"), at_ms);
    }

    #[test]
    fn chat_rows_reject_unknown_kinds() {
        let row = SurrealChatRow {
            chat_id: "c-1".to_string(),
            kind: "broadcast".to_string(),
            name: None,
            trip_id: None,
            participant_ids: vec!["a".to_string(), "b".to_string()],
            last_message_id: None,
            last_message_at: "2026-01-01T00:00:00Z".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert!(matches!(row.into_chat(), Err(DomainError::Storage(_))));
    }

    #[test]
    fn uniqueness_key_distinguishes_pairs_and_trips() {
        let mut chat = Chat {
            chat_id: "c-1".to_string(),
            kind: ChatKind::Private,
            participant_ids: vec!["a".to_string(), "b".to_string()],
            last_message_id: None,
            last_message_at_ms: 0,
            created_at_ms: 0,
        };
        assert_eq!(uniqueness_key(&chat).expect("key"), "pair:1:a:b");
        chat.kind = ChatKind::Group {
            name: "Bali Chat".to_string(),
            trip_id: "t-1".to_string(),
        };
        assert_eq!(uniqueness_key(&chat).expect("key"), "trip:t-1");
    }
}
