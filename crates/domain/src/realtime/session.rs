use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::messages::{MessageKind, MessageStore};
use crate::ports::auth::TokenValidator;
use crate::profiles::ProfileResolver;
use crate::realtime::protocol::{ClientEvent, ServerEvent};
use crate::realtime::rooms::{RoomId, RoomRegistry, SessionId};

const CHAT_NOT_FOUND: &str = "Chat not found";
const NOT_PARTICIPANT: &str = "You are not a participant of this chat";
const SEND_FAILED: &str = "Failed to send message";
const JOIN_FAILED: &str = "Failed to join chat";

/// Who may join a chat room.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomJoinPolicy {
    /// Any authenticated session may join any chat room.
    #[default]
    Open,
    /// Only chat participants may join.
    Participants,
}

impl RoomJoinPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(RoomJoinPolicy::Open),
            "participants" => Some(RoomJoinPolicy::Participants),
            _ => None,
        }
    }
}

/// A registered session and the queue its outbound events arrive on.
pub struct SessionConnection {
    pub session_id: SessionId,
    pub identity: ActorIdentity,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Owns every live session and its room memberships. Persistence is awaited with
/// no registry lock held.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    registry: RwLock<RoomRegistry>,
    next_session_id: AtomicU64,
    auth: Arc<dyn TokenValidator>,
    messages: MessageStore,
    profiles: ProfileResolver,
    join_policy: RoomJoinPolicy,
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn TokenValidator>,
        messages: MessageStore,
        profiles: ProfileResolver,
        join_policy: RoomJoinPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(RoomRegistry::default()),
                next_session_id: AtomicU64::new(1),
                auth,
                messages,
                profiles,
                join_policy,
            }),
        }
    }

    pub fn join_policy(&self) -> RoomJoinPolicy {
        self.inner.join_policy
    }

    /// Validates a handshake credential. Any failure is reported as
    /// `Unauthenticated`.
    pub async fn authenticate(&self, token: Option<&str>) -> DomainResult<ActorIdentity> {
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(DomainError::Unauthenticated)?;
        self.inner.auth.validate(token).await.map_err(|err| {
            tracing::debug!(error = %err, "realtime handshake rejected");
            DomainError::Unauthenticated
        })
    }

    pub async fn open_session(&self, identity: ActorIdentity) -> SessionConnection {
        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (sender, events) = mpsc::unbounded_channel();
        self.inner
            .registry
            .write()
            .await
            .register(session_id, identity.clone(), sender);
        tracing::info!(session_id, user_id = %identity.user_id, "realtime session opened");
        SessionConnection {
            session_id,
            identity,
            events,
        }
    }

    /// Authenticates and registers in one step.
    pub async fn connect(&self, token: Option<&str>) -> DomainResult<SessionConnection> {
        let identity = self.authenticate(token).await?;
        Ok(self.open_session(identity).await)
    }

    /// Dispatches one decoded client frame. Failures become an `error` event for
    /// this session only.
    pub async fn handle(&self, session_id: SessionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinChat { chat_id } => self.join_chat(session_id, &chat_id).await,
            ClientEvent::LeaveChat { chat_id } => self.leave_chat(session_id, &chat_id).await,
            ClientEvent::SendMessage {
                chat_id,
                content,
                kind,
            } => {
                self.send_message(session_id, &chat_id, &content, kind)
                    .await
            }
            ClientEvent::TypingStart { chat_id } => self.typing(session_id, &chat_id, true).await,
            ClientEvent::TypingStop { chat_id } => self.typing(session_id, &chat_id, false).await,
        }
    }

    pub async fn join_chat(&self, session_id: SessionId, chat_id: &str) {
        let Some(identity) = self.identity(session_id).await else {
            return;
        };

        if self.inner.join_policy == RoomJoinPolicy::Participants {
            if let Err(err) = self
                .inner
                .messages
                .authorize(chat_id, &identity.user_id)
                .await
            {
                tracing::debug!(session_id, chat_id, error = %err, "room join refused");
                self.report_error(session_id, realtime_error_message(&err, JOIN_FAILED))
                    .await;
                return;
            }
        }

        let joined = self
            .inner
            .registry
            .write()
            .await
            .join(session_id, RoomId::Chat(chat_id.to_string()));
        if joined {
            tracing::debug!(session_id, user_id = %identity.user_id, chat_id, "joined chat room");
        }
    }

    pub async fn leave_chat(&self, session_id: SessionId, chat_id: &str) {
        let left = self
            .inner
            .registry
            .write()
            .await
            .leave(session_id, &RoomId::Chat(chat_id.to_string()));
        if left {
            tracing::debug!(session_id, chat_id, "left chat room");
        }
    }

    /// Persists the message, then fans `new_message` and `chat_updated` out to the
    /// chat room, the sender's own session included.
    pub async fn send_message(
        &self,
        session_id: SessionId,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
    ) {
        let Some(identity) = self.identity(session_id).await else {
            return;
        };

        let view = match self.persist(&identity, chat_id, content, kind).await {
            Ok(view) => view,
            Err(err) => {
                tracing::warn!(
                    session_id,
                    user_id = %identity.user_id,
                    chat_id,
                    error = %err,
                    "realtime send failed"
                );
                self.report_error(session_id, realtime_error_message(&err, SEND_FAILED))
                    .await;
                return;
            }
        };

        let room = RoomId::Chat(view.chat_id.clone());
        let updated = ServerEvent::ChatUpdated {
            chat_id: view.chat_id.clone(),
            last_message_at_ms: view.created_at_ms,
            last_message: view.clone(),
        };
        let registry = self.inner.registry.read().await;
        let delivered = registry.broadcast(&room, &ServerEvent::NewMessage(view), None);
        registry.broadcast(&room, &updated, None);
        tracing::debug!(session_id, chat_id, delivered, "message broadcast");
    }

    async fn persist(
        &self,
        identity: &ActorIdentity,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> DomainResult<crate::profiles::MessageView> {
        let message = self
            .inner
            .messages
            .append(chat_id, &identity.user_id, content, kind)
            .await?;
        self.inner.profiles.message_view(message).await
    }

    /// Relays a typing signal to every other session in the room. No expiry is
    /// applied; a session that disconnects mid-typing leaves peers showing it.
    pub async fn typing(&self, session_id: SessionId, chat_id: &str, started: bool) {
        let registry = self.inner.registry.read().await;
        let Some(identity) = registry.identity(session_id) else {
            return;
        };
        let event = if started {
            ServerEvent::UserTyping {
                user_id: identity.user_id.clone(),
                user_name: identity.username.clone(),
                chat_id: chat_id.to_string(),
            }
        } else {
            ServerEvent::UserStoppedTyping {
                user_id: identity.user_id.clone(),
                chat_id: chat_id.to_string(),
            }
        };
        registry.broadcast(
            &RoomId::Chat(chat_id.to_string()),
            &event,
            Some(session_id),
        );
    }

    pub async fn report_error(&self, session_id: SessionId, message: impl Into<String>) {
        self.inner
            .registry
            .read()
            .await
            .send_to(session_id, ServerEvent::error(message));
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        let removed = self.inner.registry.write().await.remove(session_id);
        if let Some(identity) = removed {
            tracing::info!(session_id, user_id = %identity.user_id, "realtime session closed");
        }
    }

    pub async fn rooms_of(&self, session_id: SessionId) -> Vec<RoomId> {
        self.inner.registry.read().await.rooms_of(session_id)
    }

    pub async fn room_size(&self, room: &RoomId) -> usize {
        self.inner.registry.read().await.room_size(room)
    }

    pub async fn session_count(&self) -> usize {
        self.inner.registry.read().await.session_count()
    }

    async fn identity(&self, session_id: SessionId) -> Option<ActorIdentity> {
        self.inner
            .registry
            .read()
            .await
            .identity(session_id)
            .cloned()
    }
}

fn realtime_error_message(err: &DomainError, fallback: &str) -> String {
    match err {
        DomainError::ChatNotFound => CHAT_NOT_FOUND.to_string(),
        DomainError::NotParticipant => NOT_PARTICIPANT.to_string(),
        DomainError::Validation(message) => message.clone(),
        _ => fallback.to_string(),
    }
}
