//! The opaque client-state string round-tripped through subscriptions
//!
//! Every subscription carries `{"s": secret, "g": guild id, "c": chat id}`
//! and every notification echoes it back. `s` gates spoofed or foreign
//! notifications; `g` and `c` route the item to its bridge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientState {
    pub s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
}

pub fn build(secret: &str, guild_id: u64, chat_id: &str) -> String {
    serde_json::to_string(&ClientState {
        s: secret.to_string(),
        g: Some(guild_id),
        c: Some(chat_id.to_string()),
    })
    .expect("client state serializes")
}

/// Parse a notification's client state. `None` means it was not produced
/// by this bridge (or not by any bridge at all).
pub fn parse(raw: &str) -> Option<ClientState> {
    serde_json::from_str(raw).ok()
}
