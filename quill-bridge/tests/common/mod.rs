//! Shared fixtures for the bridge integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use quill_bridge::settings::{GuildSettings, MemorySettingsStore};
use quill_bridge::{AppState, BridgeConfig, RelayReceivers};
use quill_graph::TokenSet;
use serde_json::{json, Value as JsonValue};

pub const SECRET: &str = "sekrit";

/// Configuration pointing every outbound client at one mock server.
pub fn config(base: &str) -> BridgeConfig {
    BridgeConfig {
        client_id: "client".to_string(),
        tenant: "common".to_string(),
        client_state_secret: SECRET.to_string(),
        external_url: "https://bridge.example".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: String::new(),
        bot_token: "bot-token".to_string(),
        authority_base: base.to_string(),
        graph_base: base.to_string(),
        discord_api_base: base.to_string(),
    }
}

pub fn state(
    server: &mockito::Server,
) -> (Arc<AppState>, RelayReceivers, Arc<MemorySettingsStore>) {
    let store = Arc::new(MemorySettingsStore::default());
    let (state, receivers) = AppState::new(config(&server.url()), store.clone());
    (state, receivers, store)
}

pub fn tokens(expires_offset: i64) -> TokenSet {
    TokenSet {
        token_type: "Bearer".to_string(),
        scope: "ChatMessage.Send Chat.Read email".to_string(),
        access_token: "stored-access".to_string(),
        refresh_token: "stored-refresh".to_string(),
        id_token: "stored-id".to_string(),
        expires: Utc::now().timestamp() + expires_offset,
    }
}

/// A fully bridged guild: authorized, chat bound, channel bound.
pub fn bridged_settings(chat_id: &str, channel_id: u64, expires_offset: i64) -> GuildSettings {
    GuildSettings {
        teams_auth: Some(tokens(expires_offset)),
        teams_channel: Some(channel_id),
        teams_chat_id: Some(chat_id.to_string()),
    }
}

pub fn client_state(secret: &str, guild_id: u64, chat_id: &str) -> String {
    json!({ "s": secret, "g": guild_id, "c": chat_id }).to_string()
}

/// One `value[]` entry of a chat message notification.
pub fn chat_item(secret: &str, guild_id: u64, chat_id: &str, odata_id: &str) -> JsonValue {
    json!({
        "subscriptionId": "sub-1",
        "clientState": client_state(secret, guild_id, chat_id),
        "resourceData": { "@odata.id": odata_id },
        "changeType": "created",
    })
}

/// One `value[]` entry of a lifecycle notification.
pub fn lifecycle_item(
    secret: &str,
    guild_id: u64,
    chat_id: &str,
    event: &str,
) -> JsonValue {
    json!({
        "subscriptionId": "sub-1",
        "subscriptionExpirationDateTime": "2024-05-01T12:30:00Z",
        "tenantId": "tenant-1",
        "clientState": client_state(secret, guild_id, chat_id),
        "lifecycleEvent": event,
    })
}

/// A fetched chat message body as Graph returns it.
pub fn teams_message(display_name: &str, content_type: &str, content: &str) -> String {
    json!({
        "from": { "user": { "displayName": display_name } },
        "body": { "contentType": content_type, "content": content },
    })
    .to_string()
}

pub const TOKEN_BODY: &str = r#"{
    "token_type": "Bearer",
    "scope": "ChatMessage.Send Chat.Read email",
    "expires_in": 3600,
    "access_token": "fresh-access",
    "refresh_token": "fresh-refresh",
    "id_token": "fresh-id"
}"#;
