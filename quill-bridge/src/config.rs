//! Configuration for the bridge service

use std::env;

use quill_graph::{DEFAULT_AUTHORITY_BASE, DEFAULT_GRAPH_BASE};

use crate::discord::DEFAULT_DISCORD_API_BASE;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8083;

/// A required environment variable was absent. `main` treats this as
/// "bridge feature disabled" rather than a crash.
#[derive(Debug, thiserror::Error)]
#[error("{0} environment variable not found")]
pub struct MissingVar(pub &'static str);

/// Application configuration loaded from environment variables.
///
/// The API base URLs are plain fields defaulting to the real endpoints so
/// tests can point every client at a local server.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// OAuth application (client) id
    pub client_id: String,
    /// Directory tenant, `common` for multi-tenant
    pub tenant: String,
    /// Shared secret embedded in every subscription's client state
    pub client_state_secret: String,
    /// Externally reachable base URL for webhook notification endpoints
    pub external_url: String,
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Discord bot token for channel sends
    pub bot_token: String,

    pub authority_base: String,
    pub graph_base: String,
    pub discord_api_base: String,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> std::result::Result<Self, MissingVar> {
        fn required(name: &'static str) -> std::result::Result<String, MissingVar> {
            env::var(name).map_err(|_| MissingVar(name))
        }

        Ok(Self {
            client_id: required("GRAPH_CLIENT_ID")?,
            tenant: env::var("GRAPH_TENANT").unwrap_or_else(|_| "common".to_string()),
            client_state_secret: required("GRAPH_CLIENT_STATE")?,
            external_url: required("TEAMS_EXTERNAL_URL")?,
            host: env::var("BRIDGE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("BRIDGE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database_url: required("DATABASE_URL")?,
            bot_token: required("DISCORD_BOT_TOKEN")?,
            authority_base: DEFAULT_AUTHORITY_BASE.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            discord_api_base: DEFAULT_DISCORD_API_BASE.to_string(),
        })
    }

    /// Where Graph should deliver chat message notifications.
    pub fn notification_url(&self) -> String {
        format!("{}/chatMessageNotification", self.external_url)
    }

    /// Where Graph should deliver subscription lifecycle notifications.
    pub fn lifecycle_url(&self) -> String {
        format!("{}/lifecycleNotification", self.external_url)
    }
}
