use tripmate_domain::messages::MessageKind;
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::profiles::{ChatView, MessageView};
use tripmate_domain::realtime::ClientEvent;

use crate::error::ClientResult;

/// Request/response operations the controller needs from the chat service.
pub trait ChatApi: Send + Sync {
    fn list_chats(&self) -> BoxFuture<'_, ClientResult<Vec<ChatView>>>;

    fn open_private_chat(&self, user_id: &str) -> BoxFuture<'_, ClientResult<ChatView>>;

    fn open_group_chat(&self, trip_id: &str) -> BoxFuture<'_, ClientResult<ChatView>>;

    fn history(&self, chat_id: &str) -> BoxFuture<'_, ClientResult<Vec<MessageView>>>;

    fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> BoxFuture<'_, ClientResult<MessageView>>;

    fn mark_read(&self, chat_id: &str) -> BoxFuture<'_, ClientResult<usize>>;
}

/// Outbound half of the realtime channel. Emitting while no connection is
/// attached fails with `ClientError::Transport`.
pub trait RealtimeLink: Send + Sync {
    fn emit(&self, event: ClientEvent) -> ClientResult<()>;
}
