use std::sync::Arc;

use tripmate_domain::chat::ChatDirectory;
use tripmate_domain::messages::MessageStore;
use tripmate_domain::ports::auth::TokenValidator;
use tripmate_domain::ports::chat::ChatRepository;
use tripmate_domain::ports::trips::TripRepository;
use tripmate_domain::ports::users::UserRepository;
use tripmate_domain::profiles::ProfileResolver;
use tripmate_domain::realtime::SessionManager;
use tripmate_domain::trips::TripService;
use tripmate_infra::auth::JwtTokenValidator;
use tripmate_infra::config::AppConfig;
use tripmate_infra::db::{self, DbConfig};
use tripmate_infra::repositories::{
    InMemoryChatRepository, InMemoryTripRepository, InMemoryUserRepository,
    SurrealChatRepository, SurrealTripRepository, SurrealUserRepository,
};
use tripmate_infra::seed::SeedData;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub chat_repo: Arc<dyn ChatRepository>,
    pub trip_repo: Arc<dyn TripRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub auth: Arc<dyn TokenValidator>,
    pub sessions: SessionManager,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let state = if config.uses_surreal() {
            let client = db::connect(&DbConfig::from_app_config(&config)).await?;
            Self::with_repositories(
                config,
                Arc::new(SurrealChatRepository::with_client(client.clone())),
                Arc::new(SurrealTripRepository::with_client(client.clone())),
                Arc::new(SurrealUserRepository::with_client(client)),
            )
        } else {
            tracing::info!("using in-memory persistence");
            Self::in_memory(config)
        };

        if let Some(path) = state.config.seed_path() {
            SeedData::from_file(path)
                .await?
                .apply(state.user_repo.as_ref(), state.trip_repo.as_ref())
                .await?;
        }
        Ok(state)
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_repositories(
            config,
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(InMemoryTripRepository::new()),
            Arc::new(InMemoryUserRepository::new()),
        )
    }

    pub fn with_repositories(
        config: AppConfig,
        chat_repo: Arc<dyn ChatRepository>,
        trip_repo: Arc<dyn TripRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        let auth: Arc<dyn TokenValidator> =
            Arc::new(JwtTokenValidator::new(&config.jwt_secret, user_repo.clone()));
        let sessions = SessionManager::new(
            auth.clone(),
            MessageStore::new(chat_repo.clone()),
            ProfileResolver::new(user_repo.clone()),
            config.join_policy(),
        );
        Self {
            config,
            chat_repo,
            trip_repo,
            user_repo,
            auth,
            sessions,
        }
    }

    pub fn chat_directory(&self) -> ChatDirectory {
        ChatDirectory::new(self.chat_repo.clone(), self.trip_repo.clone())
    }

    pub fn message_store(&self) -> MessageStore {
        MessageStore::new(self.chat_repo.clone())
    }

    pub fn profiles(&self) -> ProfileResolver {
        ProfileResolver::new(self.user_repo.clone())
    }

    pub fn trip_service(&self) -> TripService {
        TripService::new(self.trip_repo.clone())
    }
}
