//! Chat message fetch and post against Graph

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::types::{ChatMessage, TokenSet};

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Client for chat message resources. Takes already-refreshed tokens;
/// callers own refresh and persistence.
#[derive(Debug, Clone)]
pub struct Chats {
    graph_base: String,
    client: reqwest::Client,
}

impl Chats {
    pub fn new(graph_base: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { graph_base, client }
    }

    /// Fetch the full message resource at the `@odata.id` path carried in a
    /// change notification.
    pub async fn get_message(&self, tokens: &TokenSet, odata_id: &str) -> Result<ChatMessage> {
        let url = format!("{}/{}", self.graph_base, odata_id);
        debug!("fetching chat message {}", odata_id);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", tokens.access_token),
            )
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Post an HTML message into a chat.
    pub async fn send_message(&self, tokens: &TokenSet, chat_id: &str, html: &str) -> Result<()> {
        let url = format!("{}/chats/{}/messages", self.graph_base, chat_id);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("{} {}", tokens.token_type, tokens.access_token),
            )
            .json(&json!({ "body": { "content": html, "contentType": "html" } }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
