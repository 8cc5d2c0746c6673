#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use tripmate_domain::DomainResult;
use tripmate_domain::chat::ChatDirectory;
use tripmate_domain::error::DomainError;
use tripmate_domain::identity::{ActorIdentity, UserProfile};
use tripmate_domain::messages::MessageStore;
use tripmate_domain::ports::BoxFuture;
use tripmate_domain::ports::auth::TokenValidator;
use tripmate_domain::ports::chat::ChatRepository;
use tripmate_domain::ports::trips::TripRepository;
use tripmate_domain::ports::users::UserRepository;
use tripmate_domain::profiles::ProfileResolver;
use tripmate_domain::realtime::{RoomJoinPolicy, SessionManager};
use tripmate_domain::trips::{Trip, TripService};
use tripmate_infra::repositories::{
    InMemoryChatRepository, InMemoryTripRepository, InMemoryUserRepository,
};

/// Tokens are the user id prefixed with `token-`.
pub struct StaticTokens {
    identities: HashMap<String, ActorIdentity>,
}

impl TokenValidator for StaticTokens {
    fn validate(&self, token: &str) -> BoxFuture<'_, DomainResult<ActorIdentity>> {
        let identity = self.identities.get(token).cloned();
        Box::pin(async move { identity.ok_or(DomainError::Unauthenticated) })
    }
}

pub struct Harness {
    pub chats: Arc<InMemoryChatRepository>,
    pub trips: Arc<InMemoryTripRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub directory: ChatDirectory,
    pub messages: MessageStore,
    pub trip_service: TripService,
    pub profiles: ProfileResolver,
}

pub const USERS: [(&str, &str); 3] = [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")];

impl Harness {
    pub async fn new() -> Self {
        let chats = Arc::new(InMemoryChatRepository::new());
        let trips = Arc::new(InMemoryTripRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        for (user_id, name) in USERS {
            users
                .upsert_user(&UserProfile {
                    user_id: user_id.to_string(),
                    name: name.to_string(),
                    email: format!("{user_id}@example.com"),
                })
                .await
                .unwrap();
        }

        let chat_port: Arc<dyn ChatRepository> = chats.clone();
        let trip_port: Arc<dyn TripRepository> = trips.clone();
        Self {
            directory: ChatDirectory::new(chat_port.clone(), trip_port.clone()),
            messages: MessageStore::new(chat_port),
            trip_service: TripService::new(trip_port),
            profiles: ProfileResolver::new(users.clone()),
            chats,
            trips,
            users,
        }
    }

    pub async fn trip(&self, trip_id: &str, members: &[&str]) -> Trip {
        self.trips
            .create_trip(&Trip {
                trip_id: trip_id.to_string(),
                name: "Bali".to_string(),
                destination: "Denpasar".to_string(),
                created_by: members[0].to_string(),
                member_ids: members.iter().map(|m| m.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    pub fn sessions(&self, policy: RoomJoinPolicy) -> SessionManager {
        let identities = USERS
            .iter()
            .map(|(user_id, name)| (format!("token-{user_id}"), ActorIdentity::new(*user_id, *name)))
            .collect();
        SessionManager::new(
            Arc::new(StaticTokens { identities }),
            self.messages.clone(),
            self.profiles.clone(),
            policy,
        )
    }
}
