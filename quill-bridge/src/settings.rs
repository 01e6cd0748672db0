//! Per-guild bridge settings storage

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use quill_graph::TokenSet;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// The bridge's slice of a guild's settings. Created lazily as empty on
/// first read; fields are cleared, never the row deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams_auth: Option<TokenSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams_channel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams_chat_id: Option<String>,
}

/// Keyed by guild id, last-write-wins.
///
/// There is deliberately no transactional guard: an admin command and a
/// relay worker can race on a token write, and the loser's record just
/// triggers one extra refresh later. Adding locking would change observable
/// behavior for no correctness gain.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, guild_id: u64) -> Result<GuildSettings>;
    async fn put(&self, guild_id: u64, settings: &GuildSettings) -> Result<()>;
}

/// Run database migrations
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                id BIGINT PRIMARY KEY,
                settings JSONB NOT NULL
            )
            "#,
            &[],
        )
        .await?;
    Ok(())
}

/// Postgres-backed store; settings live in a JSONB blob per guild.
pub struct PgSettingsStore {
    pool: Pool,
}

impl PgSettingsStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get(&self, guild_id: u64) -> Result<GuildSettings> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT settings FROM guild_settings WHERE id = $1",
                &[&(guild_id as i64)],
            )
            .await?;
        match row {
            Some(row) => {
                let value: JsonValue = row.get(0);
                Ok(serde_json::from_value(value)?)
            }
            None => Ok(GuildSettings::default()),
        }
    }

    async fn put(&self, guild_id: u64, settings: &GuildSettings) -> Result<()> {
        let client = self.pool.get().await?;
        let value = serde_json::to_value(settings)?;
        client
            .execute(
                "INSERT INTO guild_settings (id, settings) VALUES ($1, $2) \
                 ON CONFLICT (id) DO UPDATE SET settings = EXCLUDED.settings",
                &[&(guild_id as i64), &value],
            )
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<HashMap<u64, GuildSettings>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, guild_id: u64) -> Result<GuildSettings> {
        let inner = self.inner.lock().expect("settings lock poisoned");
        Ok(inner.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn put(&self, guild_id: u64, settings: &GuildSettings) -> Result<()> {
        let mut inner = self.inner.lock().expect("settings lock poisoned");
        inner.insert(guild_id, settings.clone());
        Ok(())
    }
}
