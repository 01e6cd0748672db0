//! Discord REST API client
//!
//! The gateway that *receives* Discord messages and slash commands lives
//! outside this service; the bridge only needs to post relayed messages
//! into a channel.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::error::{BridgeError, Result};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Thin wrapper around the Discord REST API.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    api_base: String,
    bot_token: String,
    client: reqwest::Client,
}

impl DiscordClient {
    pub fn new(api_base: String, bot_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            api_base,
            bot_token,
            client,
        }
    }

    /// Send a message to a channel. A 404 means the channel is gone (or no
    /// longer visible to the bot) and is surfaced distinctly so callers can
    /// clear a stale binding.
    pub async fn send_message(&self, channel_id: u64, content: &str) -> Result<()> {
        debug!("sending {} chars to channel {}", content.len(), channel_id);

        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BridgeError::UnknownChannel);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Discord {
            status: status.as_u16(),
            body,
        })
    }
}
