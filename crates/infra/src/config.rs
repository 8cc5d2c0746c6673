use serde::Deserialize;
use tripmate_domain::realtime::RoomJoinPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub jwt_secret: String,
    pub realtime_heartbeat_secs: u64,
    pub realtime_join_policy: String,
    pub seed_path: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "ws://127.0.0.1:8000")?
            .set_default("surreal_ns", "tripmate")?
            .set_default("surreal_db", "chat")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("jwt_secret", "dev-secret")?
            .set_default("realtime_heartbeat_secs", 15)?
            .set_default("realtime_join_policy", "open")?
            .set_default("seed_path", "")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn is_test(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("test")
    }

    pub fn uses_surreal(&self) -> bool {
        self.data_backend.eq_ignore_ascii_case("surreal")
    }

    /// Unknown values fall back to the open policy.
    pub fn join_policy(&self) -> RoomJoinPolicy {
        RoomJoinPolicy::parse(&self.realtime_join_policy).unwrap_or_else(|| {
            tracing::warn!(
                value = %self.realtime_join_policy,
                "unknown realtime_join_policy; using open"
            );
            RoomJoinPolicy::Open
        })
    }

    pub fn seed_path(&self) -> Option<&str> {
        let path = self.seed_path.trim();
        (!path.is_empty()).then_some(path)
    }

    /// Zero disables the heartbeat ping.
    pub fn heartbeat_interval(&self) -> Option<std::time::Duration> {
        (self.realtime_heartbeat_secs > 0)
            .then(|| std::time::Duration::from_secs(self.realtime_heartbeat_secs))
    }
}
