use crate::DomainResult;
use crate::chat::Chat;
use crate::messages::{HistoryCursor, Message};

/// Document storage for chats and their messages.
///
/// Every mutation goes through one of the atomic primitives below; callers never
/// read-modify-write a document.
#[allow(clippy::needless_pass_by_value)]
pub trait ChatRepository: Send + Sync {
    fn get_chat(&self, chat_id: &str) -> crate::ports::BoxFuture<'_, DomainResult<Option<Chat>>>;

    fn find_private_chat(
        &self,
        pair_key: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Chat>>>;

    fn find_group_chat(
        &self,
        trip_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Chat>>>;

    /// Fails with `DomainError::Conflict` when a private chat for the same pair, or a
    /// group chat for the same trip, already exists.
    fn create_chat(&self, chat: &Chat) -> crate::ports::BoxFuture<'_, DomainResult<Chat>>;

    /// Chats the user participates in, most recent activity first.
    fn list_chats_for_user(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Chat>>>;

    /// Moves the last-message pointer forward. A stamp older than the stored one is
    /// ignored so `last_message_at_ms` never decreases.
    fn advance_last_message(
        &self,
        chat_id: &str,
        message_id: &str,
        at_ms: i64,
    ) -> crate::ports::BoxFuture<'_, DomainResult<()>>;

    fn create_message(&self, message: &Message)
    -> crate::ports::BoxFuture<'_, DomainResult<Message>>;

    fn get_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Message>>>;

    /// Messages ordered by `(created_at_ms, message_id)` ascending.
    fn list_messages(
        &self,
        chat_id: &str,
        cursor: &HistoryCursor,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Message>>>;

    /// Adds a `(user_id, read_at_ms)` receipt to every message of the chat that has
    /// none for this user. Returns the number of receipts added.
    fn mark_read(
        &self,
        chat_id: &str,
        user_id: &str,
        read_at_ms: i64,
    ) -> crate::ports::BoxFuture<'_, DomainResult<usize>>;
}
