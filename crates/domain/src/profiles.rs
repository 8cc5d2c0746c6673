use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::chat::{Chat, ChatKind};
use crate::identity::UserRef;
use crate::messages::{Message, MessageKind, ReadReceipt};
use crate::ports::users::UserRepository;

/// Message as sent to clients, with the sender resolved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    pub message_id: String,
    pub chat_id: String,
    pub sender: UserRef,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub read_receipts: Vec<ReadReceipt>,
    pub created_at_ms: i64,
}

impl MessageView {
    pub fn from_parts(message: Message, sender: UserRef) -> Self {
        Self {
            message_id: message.message_id,
            chat_id: message.chat_id,
            sender,
            content: message.content,
            kind: message.kind,
            read_receipts: message.read_receipts,
            created_at_ms: message.created_at_ms,
        }
    }

    pub fn sender_id(&self) -> &str {
        self.sender.user_id()
    }

    pub fn sort_key(&self) -> (i64, &str) {
        (self.created_at_ms, self.message_id.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatView {
    pub chat_id: String,
    #[serde(flatten)]
    pub kind: ChatKind,
    pub participants: Vec<UserRef>,
    pub last_message: Option<MessageView>,
    pub last_message_at_ms: i64,
    pub created_at_ms: i64,
}

impl ChatView {
    /// Group name, or the first participant other than `viewer_id` for private chats.
    pub fn title_for(&self, viewer_id: &str) -> String {
        match &self.kind {
            ChatKind::Group { name, .. } => name.clone(),
            ChatKind::Private => self
                .participants
                .iter()
                .find(|participant| participant.user_id() != viewer_id)
                .map(|participant| participant.display_name().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Resolves user ids into `UserRef`s at the outward boundary.
#[derive(Clone)]
pub struct ProfileResolver {
    users: Arc<dyn UserRepository>,
}

impl ProfileResolver {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Unknown ids resolve to `UserRef::Reference`.
    pub async fn resolve(&self, user_ids: &[String]) -> DomainResult<HashMap<String, UserRef>> {
        let mut ids = user_ids.to_vec();
        ids.sort();
        ids.dedup();

        let profiles = self.users.get_users(&ids).await?;
        let mut resolved: HashMap<String, UserRef> = profiles
            .into_iter()
            .map(|profile| (profile.user_id.clone(), UserRef::Populated(profile)))
            .collect();
        for id in ids {
            resolved
                .entry(id.clone())
                .or_insert_with(|| UserRef::reference(id));
        }
        Ok(resolved)
    }

    pub async fn message_view(&self, message: Message) -> DomainResult<MessageView> {
        let mut resolved = self.resolve(std::slice::from_ref(&message.sender_id)).await?;
        let sender = resolved
            .remove(&message.sender_id)
            .unwrap_or_else(|| UserRef::reference(message.sender_id.clone()));
        Ok(MessageView::from_parts(message, sender))
    }

    pub async fn message_views(&self, messages: Vec<Message>) -> DomainResult<Vec<MessageView>> {
        let sender_ids: Vec<String> = messages.iter().map(|m| m.sender_id.clone()).collect();
        let resolved = self.resolve(&sender_ids).await?;
        Ok(messages
            .into_iter()
            .map(|message| {
                let sender = resolved
                    .get(&message.sender_id)
                    .cloned()
                    .unwrap_or_else(|| UserRef::reference(message.sender_id.clone()));
                MessageView::from_parts(message, sender)
            })
            .collect())
    }

    pub async fn chat_view(
        &self,
        chat: Chat,
        last_message: Option<Message>,
    ) -> DomainResult<ChatView> {
        let mut ids = chat.participant_ids.clone();
        if let Some(message) = &last_message {
            ids.push(message.sender_id.clone());
        }
        let resolved = self.resolve(&ids).await?;
        let lookup = |user_id: &String| {
            resolved
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| UserRef::reference(user_id.clone()))
        };

        let participants = chat.participant_ids.iter().map(lookup).collect();
        let last_message = last_message.map(|message| {
            let sender = lookup(&message.sender_id);
            MessageView::from_parts(message, sender)
        });
        Ok(ChatView {
            chat_id: chat.chat_id,
            kind: chat.kind,
            participants,
            last_message,
            last_message_at_ms: chat.last_message_at_ms,
            created_at_ms: chat.created_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserProfile;
    use crate::ports::BoxFuture;

    struct FixedUsers(Vec<UserProfile>);

    impl UserRepository for FixedUsers {
        fn get_user(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<UserProfile>>> {
            let found = self.0.iter().find(|u| u.user_id == user_id).cloned();
            Box::pin(async move { Ok(found) })
        }

        fn get_users(&self, user_ids: &[String]) -> BoxFuture<'_, DomainResult<Vec<UserProfile>>> {
            let found = self
                .0
                .iter()
                .filter(|u| user_ids.contains(&u.user_id))
                .cloned()
                .collect();
            Box::pin(async move { Ok(found) })
        }

        fn upsert_user(&self, user: &UserProfile) -> BoxFuture<'_, DomainResult<UserProfile>> {
            let user = user.clone();
            Box::pin(async move { Ok(user) })
        }
    }

    fn resolver() -> ProfileResolver {
        ProfileResolver::new(Arc::new(FixedUsers(vec![UserProfile {
            user_id: "a".to_string(),
            name: "Ayu".to_string(),
            email: "ayu@example.com".to_string(),
        }])))
    }

    #[tokio::test]
    async fn unknown_users_stay_references() {
        let resolved = resolver()
            .resolve(&["a".to_string(), "ghost".to_string(), "a".to_string()])
            .await
            .expect("resolve");
        assert_eq!(resolved.len(), 2);
        assert!(resolved["a"].is_populated());
        assert_eq!(resolved["ghost"], UserRef::reference("ghost"));
    }

    #[tokio::test]
    async fn private_chat_title_is_the_other_participant() {
        let chat = Chat {
            chat_id: "c-1".to_string(),
            kind: ChatKind::Private,
            participant_ids: vec!["a".to_string(), "b".to_string()],
            last_message_id: None,
            last_message_at_ms: 1,
            created_at_ms: 1,
        };
        let view = resolver().chat_view(chat, None).await.expect("view");
        assert_eq!(view.title_for("b"), "Ayu");
        assert_eq!(view.title_for("a"), "b");
        assert!(view.last_message.is_none());
    }
}
