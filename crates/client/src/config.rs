use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::reconnect::ExponentialBackoff;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub token: String,
    pub user_id: String,
    pub user_name: String,
    pub log_level: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// 0 retries forever.
    pub reconnect_max_attempts: u32,
}

impl ClientConfig {
    /// Reads `TRIPMATE_CLIENT_*` variables, with `.env` support.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(config::Environment::with_prefix("TRIPMATE_CLIENT").prefix_separator("_"))
    }

    fn from_environment(env: config::Environment) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .set_default("server_url", "http://127.0.0.1:3000")?
            .set_default("token", "")?
            .set_default("user_id", "")?
            .set_default("user_name", "")?
            .set_default("log_level", "warn")?
            .set_default("reconnect_initial_ms", 1_000)?
            .set_default("reconnect_max_ms", 5_000)?
            .set_default("reconnect_max_attempts", 0)?
            .add_source(env)
            .build()?;
        let loaded: Self = cfg.try_deserialize()?;
        if loaded.token.trim().is_empty() {
            return Err(config::ConfigError::Message("TRIPMATE_CLIENT_TOKEN must be set".into()));
        }
        if loaded.user_id.trim().is_empty() {
            return Err(config::ConfigError::Message("TRIPMATE_CLIENT_USER_ID must be set".into()));
        }
        Ok(loaded)
    }

    pub fn api_base_url(&self) -> ClientResult<Url> {
        Url::parse(&self.server_url)
            .map_err(|err| ClientError::Validation(format!("invalid server_url: {err}")))
    }

    /// The `/realtime` endpoint on the same host, with a WebSocket scheme.
    pub fn realtime_url(&self) -> ClientResult<Url> {
        let mut url = self.api_base_url()?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Validation("server_url cannot carry a websocket scheme".into()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Validation("server_url cannot be a base".into()))?
            .pop_if_empty()
            .push("realtime");
        Ok(url)
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial: Duration::from_millis(self.reconnect_initial_ms.max(1)),
            max: Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_initial_ms)),
            max_attempts: (self.reconnect_max_attempts > 0).then_some(self.reconnect_max_attempts),
        }
    }
}
