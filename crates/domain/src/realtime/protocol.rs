use serde::{Deserialize, Serialize};

use crate::messages::MessageKind;
use crate::profiles::MessageView;

/// Frames a client may send. Encoded as `{"event": "...", "data": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat {
        chat_id: String,
    },
    LeaveChat {
        chat_id: String,
    },
    SendMessage {
        chat_id: String,
        content: String,
        #[serde(rename = "type", default)]
        kind: MessageKind,
    },
    TypingStart {
        chat_id: String,
    },
    TypingStop {
        chat_id: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat { .. } => "join_chat",
            ClientEvent::LeaveChat { .. } => "leave_chat",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::TypingStart { .. } => "typing_start",
            ClientEvent::TypingStop { .. } => "typing_stop",
        }
    }

    pub fn chat_id(&self) -> &str {
        match self {
            ClientEvent::JoinChat { chat_id }
            | ClientEvent::LeaveChat { chat_id }
            | ClientEvent::SendMessage { chat_id, .. }
            | ClientEvent::TypingStart { chat_id }
            | ClientEvent::TypingStop { chat_id } => chat_id,
        }
    }
}

/// Frames pushed by the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(MessageView),
    ChatUpdated {
        chat_id: String,
        last_message: MessageView,
        last_message_at_ms: i64,
    },
    UserTyping {
        user_id: String,
        user_name: String,
        chat_id: String,
    },
    UserStoppedTyping {
        user_id: String,
        chat_id: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::ChatUpdated { .. } => "chat_updated",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_frame_defaults_type_to_text() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "data": { "chat_id": "c-1", "content": "hi" }
        }))
        .expect("decode");
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                chat_id: "c-1".to_string(),
                content: "hi".to_string(),
                kind: MessageKind::Text,
            }
        );
        assert_eq!(event.name(), "send_message");
        assert_eq!(event.chat_id(), "c-1");
    }

    #[test]
    fn unknown_event_is_rejected() {
        let decoded = serde_json::from_value::<ClientEvent>(json!({
            "event": "delete_chat",
            "data": { "chat_id": "c-1" }
        }));
        assert!(decoded.is_err());
    }

    #[test]
    fn server_events_are_adjacently_tagged() {
        let value = serde_json::to_value(ServerEvent::UserStoppedTyping {
            user_id: "a".to_string(),
            chat_id: "c-1".to_string(),
        })
        .expect("json");
        assert_eq!(
            value,
            json!({
                "event": "user_stopped_typing",
                "data": { "user_id": "a", "chat_id": "c-1" }
            })
        );

        let value = serde_json::to_value(ServerEvent::error("Chat not found")).expect("json");
        assert_eq!(
            value,
            json!({ "event": "error", "data": { "message": "Chat not found" } })
        );
    }
}
