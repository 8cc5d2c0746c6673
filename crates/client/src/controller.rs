use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tripmate_domain::identity::ActorIdentity;
use tripmate_domain::messages::{MessageKind, validate_content};
use tripmate_domain::profiles::{ChatView, MessageView};
use tripmate_domain::realtime::{ClientEvent, ServerEvent};

use crate::api::{ChatApi, RealtimeLink};
use crate::error::{ClientError, ClientResult};
use crate::reconnect::{BackoffPolicy, ConnectionState, LifecycleEvent, ReconnectMachine};

/// Everything a single chat screen renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatViewState {
    pub active_chat: Option<ChatView>,
    /// Ordered by `(created_at_ms, message_id)`, unique by id.
    pub messages: Vec<MessageView>,
    pub connection_state: ConnectionState,
    /// user id -> display name
    pub typing_peers: BTreeMap<String, String>,
    pub chats: Vec<ChatView>,
    pub last_error: Option<String>,
    pub session_expired: bool,
}

impl Default for ChatViewState {
    fn default() -> Self {
        Self {
            active_chat: None,
            messages: Vec::new(),
            connection_state: ConnectionState::Disconnected,
            typing_peers: BTreeMap::new(),
            chats: Vec::new(),
            last_error: None,
            session_expired: false,
        }
    }
}

impl ChatViewState {
    fn active_chat_id(&self) -> Option<&str> {
        self.active_chat.as_ref().map(|chat| chat.chat_id.as_str())
    }

    /// Returns false when a message with the same id is already present.
    fn insert_message(&mut self, message: MessageView) -> bool {
        if self
            .messages
            .iter()
            .any(|existing| existing.message_id == message.message_id)
        {
            return false;
        }
        let position = self
            .messages
            .partition_point(|existing| existing.sort_key() < message.sort_key());
        self.messages.insert(position, message);
        true
    }

    fn sort_chats(&mut self) {
        self.chats.sort_by(|a, b| {
            b.last_message_at_ms
                .cmp(&a.last_message_at_ms)
                .then_with(|| b.chat_id.cmp(&a.chat_id))
        });
    }
}

/// Drives one chat UI: the active chat, its messages, typing peers and the
/// realtime connection lifecycle.
pub struct ChatController {
    identity: ActorIdentity,
    api: Arc<dyn ChatApi>,
    link: Arc<dyn RealtimeLink>,
    reconnect: ReconnectMachine,
    state: ChatViewState,
}

impl ChatController {
    pub fn new(
        identity: ActorIdentity,
        api: Arc<dyn ChatApi>,
        link: Arc<dyn RealtimeLink>,
        backoff: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            identity,
            api,
            link,
            reconnect: ReconnectMachine::new(backoff),
            state: ChatViewState::default(),
        }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn state(&self) -> &ChatViewState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connection_state.is_connected()
    }

    pub async fn refresh_chats(&mut self) -> ClientResult<()> {
        let result = self.api.list_chats().await;
        let chats = self.guard(result)?;
        self.state.chats = chats;
        self.state.sort_chats();
        Ok(())
    }

    pub async fn start_private_chat(&mut self, user_id: &str) -> ClientResult<()> {
        let result = self.api.open_private_chat(user_id).await;
        let chat = self.guard(result)?;
        self.remember_chat(chat.clone());
        self.open_chat(chat).await
    }

    pub async fn start_group_chat(&mut self, trip_id: &str) -> ClientResult<()> {
        let result = self.api.open_group_chat(trip_id).await;
        let chat = self.guard(result)?;
        self.remember_chat(chat.clone());
        self.open_chat(chat).await
    }

    /// Switches the active chat: leave the old room, reset local state, load
    /// history, mark it read, then join the new room.
    pub async fn open_chat(&mut self, chat: ChatView) -> ClientResult<()> {
        if let Some(previous) = self.state.active_chat.take() {
            self.emit_if_connected(ClientEvent::LeaveChat {
                chat_id: previous.chat_id,
            });
        }
        self.state.messages.clear();
        self.state.typing_peers.clear();
        self.state.last_error = None;

        let chat_id = chat.chat_id.clone();
        self.state.active_chat = Some(chat);

        if let Err(err) = self.load_active_chat(&chat_id).await {
            // A chat whose room was never joined must not stay active.
            self.state.active_chat = None;
            self.state.messages.clear();
            return Err(err);
        }

        self.emit_if_connected(ClientEvent::JoinChat { chat_id });
        Ok(())
    }

    async fn load_active_chat(&mut self, chat_id: &str) -> ClientResult<()> {
        let result = self.api.history(chat_id).await;
        let history = self.guard(result)?;
        for message in history {
            self.state.insert_message(message);
        }
        let result = self.api.mark_read(chat_id).await;
        self.guard(result)?;
        Ok(())
    }

    pub fn close_chat(&mut self) {
        if let Some(chat) = self.state.active_chat.take() {
            self.emit_if_connected(ClientEvent::LeaveChat {
                chat_id: chat.chat_id,
            });
        }
        self.state.messages.clear();
        self.state.typing_peers.clear();
    }

    /// Sends into the active chat. While connected the message arrives back as a
    /// `new_message` event; otherwise it is posted over HTTP and shown at once.
    pub async fn send(&mut self, content: &str, kind: MessageKind) -> ClientResult<()> {
        let chat_id = self
            .state
            .active_chat_id()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Validation("no active chat".into()))?;
        let content =
            validate_content(content).map_err(|err| ClientError::Validation(err.to_string()))?;

        if self.is_connected() {
            let emitted = self.link.emit(ClientEvent::SendMessage {
                chat_id: chat_id.clone(),
                content: content.clone(),
                kind,
            });
            match emitted {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(error = %err, %chat_id, "realtime send failed; using http");
                }
            }
        }

        let result = self.api.send_message(&chat_id, &content, kind).await;
        let message = self.guard(result)?;
        if self.state.active_chat_id() == Some(message.chat_id.as_str()) {
            self.state.insert_message(message);
        }
        Ok(())
    }

    pub fn start_typing(&mut self) {
        if let Some(chat_id) = self.state.active_chat_id().map(str::to_string) {
            self.emit_if_connected(ClientEvent::TypingStart { chat_id });
        }
    }

    pub fn stop_typing(&mut self) {
        if let Some(chat_id) = self.state.active_chat_id().map(str::to_string) {
            self.emit_if_connected(ClientEvent::TypingStop { chat_id });
        }
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::NewMessage(message) => {
                if self.state.active_chat_id() != Some(message.chat_id.as_str()) {
                    return;
                }
                self.state.typing_peers.remove(message.sender_id());
                self.state.insert_message(message);
            }
            ServerEvent::ChatUpdated {
                chat_id,
                last_message,
                last_message_at_ms,
            } => {
                let summaries = self
                    .state
                    .chats
                    .iter_mut()
                    .chain(self.state.active_chat.as_mut())
                    .filter(|chat| chat.chat_id == chat_id);
                for chat in summaries {
                    chat.last_message = Some(last_message.clone());
                    chat.last_message_at_ms = chat.last_message_at_ms.max(last_message_at_ms);
                }
                self.state.sort_chats();
            }
            ServerEvent::UserTyping {
                user_id,
                user_name,
                chat_id,
            } => {
                if user_id != self.identity.user_id
                    && self.state.active_chat_id() == Some(chat_id.as_str())
                {
                    self.state.typing_peers.insert(user_id, user_name);
                }
            }
            ServerEvent::UserStoppedTyping { user_id, chat_id } => {
                if self.state.active_chat_id() == Some(chat_id.as_str()) {
                    self.state.typing_peers.remove(&user_id);
                }
            }
            ServerEvent::Error { message } => {
                tracing::warn!(%message, "realtime error");
                self.state.last_error = Some(message);
            }
        }
    }

    /// The realtime link is up. Re-joins the active chat's room.
    pub fn connection_established(&mut self) -> LifecycleEvent {
        let event = self.reconnect.connected();
        self.sync_connection_state();
        self.state.session_expired = false;
        if let Some(chat_id) = self.state.active_chat_id().map(str::to_string) {
            self.emit_if_connected(ClientEvent::JoinChat { chat_id });
        }
        tracing::info!(event = event.name(), "realtime connected");
        event
    }

    /// The link dropped. Returns the delay before the next attempt, or `None`
    /// once the backoff policy gives up.
    pub fn connection_lost(&mut self, reason: &str) -> Option<Duration> {
        let event = self.reconnect.disconnected(reason);
        tracing::info!(event = event.name(), reason, "realtime disconnected");
        self.schedule_reconnect()
    }

    /// A connect attempt failed. Credential rejection ends the session instead
    /// of retrying.
    pub fn connection_failed(&mut self, error: &ClientError) -> Option<Duration> {
        if error.is_auth_failure() {
            self.reset_session();
            return None;
        }
        let event = self.reconnect.attempt_failed(error.to_string());
        tracing::warn!(event = event.name(), error = %error, "realtime connect failed");
        self.schedule_reconnect()
    }

    /// Drops every piece of session state and flags the session as expired.
    pub fn reset_session(&mut self) {
        self.reconnect.stop();
        self.state = ChatViewState {
            session_expired: true,
            ..ChatViewState::default()
        };
        tracing::warn!(user_id = %self.identity.user_id, "session expired");
    }

    fn schedule_reconnect(&mut self) -> Option<Duration> {
        let event = self.reconnect.schedule();
        self.sync_connection_state();
        match self.state.connection_state {
            ConnectionState::Reconnecting { attempt, delay } => {
                tracing::debug!(event = event.name(), attempt, ?delay, "reconnect scheduled");
                Some(delay)
            }
            _ => {
                tracing::warn!(event = event.name(), "giving up on realtime connection");
                None
            }
        }
    }

    fn sync_connection_state(&mut self) {
        self.state.connection_state = self.reconnect.state();
    }

    fn remember_chat(&mut self, chat: ChatView) {
        match self
            .state
            .chats
            .iter_mut()
            .find(|existing| existing.chat_id == chat.chat_id)
        {
            Some(existing) => *existing = chat,
            None => self.state.chats.push(chat),
        }
        self.state.sort_chats();
    }

    fn emit_if_connected(&mut self, event: ClientEvent) {
        if !self.is_connected() {
            return;
        }
        if let Err(err) = self.link.emit(event) {
            tracing::debug!(error = %err, "dropping realtime event");
        }
    }

    /// Resets the session on credential rejection; other errors are recorded
    /// and handed back.
    fn guard<T>(&mut self, result: ClientResult<T>) -> ClientResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_auth_failure() {
                    self.reset_session();
                } else {
                    self.state.last_error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }
}
