use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::AppConfig;

/// Uniqueness of private pairs and per-trip group chats is enforced by the store.
const SCHEMA: &str = "\
    DEFINE TABLE IF NOT EXISTS chat SCHEMALESS;\n\
    DEFINE INDEX IF NOT EXISTS chat_id_unique ON TABLE chat FIELDS chat_id UNIQUE;\n\
    DEFINE INDEX IF NOT EXISTS chat_uniqueness_key_unique ON TABLE chat FIELDS uniqueness_key UNIQUE;\n\
    DEFINE INDEX IF NOT EXISTS chat_participants ON TABLE chat FIELDS participant_ids;\n\
    DEFINE TABLE IF NOT EXISTS chat_message SCHEMALESS;\n\
    DEFINE INDEX IF NOT EXISTS chat_message_id_unique ON TABLE chat_message FIELDS message_id UNIQUE;\n\
    DEFINE INDEX IF NOT EXISTS chat_message_order ON TABLE chat_message FIELDS chat_id, created_at, message_id;\n\
    DEFINE TABLE IF NOT EXISTS trip SCHEMALESS;\n\
    DEFINE INDEX IF NOT EXISTS trip_id_unique ON TABLE trip FIELDS trip_id UNIQUE;\n\
    DEFINE TABLE IF NOT EXISTS app_user SCHEMALESS;\n\
    DEFINE INDEX IF NOT EXISTS app_user_id_unique ON TABLE app_user FIELDS user_id UNIQUE;";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            endpoint: config.surreal_endpoint.clone(),
            namespace: config.surreal_ns.clone(),
            database: config.surreal_db.clone(),
            username: config.surreal_user.clone(),
            password: config.surreal_pass.clone(),
        }
    }
}

/// Opens an authenticated client scoped to the configured namespace and database,
/// and applies the schema.
pub async fn connect(config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    health_check(config).await?;

    let db = Surreal::<Client>::init();
    db.connect::<Ws>(&config.endpoint)
        .await
        .with_context(|| format!("connect surrealdb endpoint {}", config.endpoint))?;
    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await
    .context("surreal signin")?;
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .context("select surrealdb namespace/database")?;

    db.query(SCHEMA)
        .await
        .context("apply chat schema")?
        .check()
        .context("apply chat schema check")?;

    tracing::info!(
        endpoint = %config.endpoint,
        namespace = %config.namespace,
        database = %config.database,
        "surrealdb connected"
    );
    Ok(Arc::new(db))
}

/// TCP reachability probe for the configured endpoint.
pub async fn health_check(config: &DbConfig) -> anyhow::Result<()> {
    let address = parse_socket_address(&config.endpoint)?;
    timeout(Duration::from_secs(2), TcpStream::connect(&address))
        .await
        .map_err(|_| anyhow::anyhow!("surreal endpoint connect timed out"))?
        .with_context(|| format!("surreal endpoint connect failed: {address}"))?;
    tracing::debug!(endpoint = %config.endpoint, "surreal health check succeeded");
    Ok(())
}

fn parse_socket_address(endpoint: &str) -> anyhow::Result<String> {
    let normalized = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("ws://{endpoint}")
    };
    let parsed = Url::parse(&normalized)
        .with_context(|| format!("invalid surreal endpoint '{endpoint}'"))?;

    let host = parsed
        .host_str()
        .with_context(|| format!("missing surreal host in endpoint '{endpoint}'"))?;
    let port = parsed.port().unwrap_or(match parsed.scheme() {
        "wss" | "https" => 443,
        _ => 8000,
    });
    Ok(format!("{host}:{port}"))
}
