//! Login and connection operations behind the admin command surface
//!
//! The slash-command UI itself lives in the gateway client; these are the
//! operations it invokes.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use quill_graph::{CreateSubscription, DeviceAuthorization, TokenSet};
use tracing::{info, warn};

use crate::client_state;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::translate;
use crate::AppState;

/// Scopes requested on login. `offline_access` and `openid` are appended
/// by the OAuth client itself.
pub const SCOPES: &[&str] = &["ChatMessage.Send", "Chat.Read", "email"];

/// Chat subscriptions are created and renewed for this long; Graph caps
/// chat message subscriptions at 60 minutes.
const CHAT_EXPIRES_MINUTES: i64 = 59;

/// Parameters for (re)creating a guild's chat message subscription.
pub fn chat_subscription(
    config: &BridgeConfig,
    guild_id: u64,
    chat_id: &str,
    now: DateTime<Utc>,
) -> CreateSubscription {
    CreateSubscription {
        notification_url: config.notification_url(),
        resource: format!("/chats/{}/messages", chat_id),
        expiration: now + Duration::minutes(CHAT_EXPIRES_MINUTES),
        client_state: client_state::build(&config.client_state_secret, guild_id, chat_id),
        lifecycle_notification_url: Some(config.lifecycle_url()),
        change_type: "created".to_string(),
    }
}

/// A device login waiting for the user to authorize out of band.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub user_id: u64,
    pub authorization: DeviceAuthorization,
}

/// In-memory map of pending logins, at most one unexpired entry per guild.
/// Never persisted; a restart just means the admin restarts the flow.
#[derive(Debug, Default)]
pub struct LoginTracker {
    sessions: Mutex<HashMap<u64, PendingLogin>>,
}

impl LoginTracker {
    /// Reject if an unexpired login is already pending for this guild.
    /// Expired sessions are evicted here, on the next attempt, rather than
    /// by a background sweep.
    pub fn check_available(&self, guild_id: u64) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("login lock poisoned");
        let now = Utc::now().timestamp();
        sessions.retain(|_, pending| pending.authorization.expires > now);
        if sessions.contains_key(&guild_id) {
            return Err(BridgeError::LoginPending);
        }
        Ok(())
    }

    pub fn record(&self, guild_id: u64, user_id: u64, authorization: DeviceAuthorization) {
        let mut sessions = self.sessions.lock().expect("login lock poisoned");
        sessions.insert(
            guild_id,
            PendingLogin {
                user_id,
                authorization,
            },
        );
    }

    pub fn pending(&self, guild_id: u64) -> Option<PendingLogin> {
        let sessions = self.sessions.lock().expect("login lock poisoned");
        sessions.get(&guild_id).cloned()
    }

    pub fn remove(&self, guild_id: u64) -> Option<PendingLogin> {
        let mut sessions = self.sessions.lock().expect("login lock poisoned");
        sessions.remove(&guild_id)
    }
}

/// Start a device login for a guild. Returns the authorization whose
/// `message` the caller shows to the admin.
pub async fn begin_login(
    state: &AppState,
    guild_id: u64,
    user_id: u64,
) -> Result<DeviceAuthorization> {
    state.logins.check_available(guild_id)?;
    let settings = state.store.get(guild_id).await?;
    if settings.teams_auth.is_some() {
        return Err(BridgeError::AlreadyAuthorized);
    }
    let authorization = state.auth.begin_device_login(SCOPES).await?;
    state.logins.record(guild_id, user_id, authorization.clone());
    Ok(authorization)
}

/// Wait for the pending login to resolve and store the tokens.
///
/// The session is destroyed on success and on terminal error alike; only
/// `authorization_pending` keeps it alive (inside the poll).
pub async fn complete_login(state: &AppState, guild_id: u64) -> Result<TokenSet> {
    let pending = state
        .logins
        .pending(guild_id)
        .ok_or(BridgeError::NoPendingLogin)?;
    let result = state.auth.poll_device_login(&pending.authorization).await;
    state.logins.remove(guild_id);
    let tokens = result?;

    let mut settings = state.store.get(guild_id).await?;
    settings.teams_auth = Some(tokens.clone());
    state.store.put(guild_id, &settings).await?;
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetConversationOutcome {
    /// Saved; the guild is not authorized yet, so no subscription attempt.
    Saved,
    SavedAndSubscribed,
    /// Saved, but the subscription attempt failed with this message. The
    /// saved chat id is never rolled back.
    SubscriptionFailed(String),
}

/// Point the bridge at a Teams conversation and, when authorized,
/// subscribe to its messages.
pub async fn set_conversation(
    state: &AppState,
    guild_id: u64,
    chat_id: &str,
) -> Result<SetConversationOutcome> {
    let mut settings = state.store.get(guild_id).await?;
    settings.teams_chat_id = Some(chat_id.to_string());
    state.store.put(guild_id, &settings).await?;

    let Some(stored) = settings.teams_auth.clone() else {
        return Ok(SetConversationOutcome::Saved);
    };
    let tokens = match state.auth.refresh(&stored).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!("refresh for {} failed: {}", guild_id, err);
            return Ok(SetConversationOutcome::SubscriptionFailed(err.to_string()));
        }
    };
    if Some(&tokens) != settings.teams_auth.as_ref() {
        settings.teams_auth = Some(tokens.clone());
        state.store.put(guild_id, &settings).await?;
    }

    let params = chat_subscription(&state.config, guild_id, chat_id, Utc::now());
    match state.subscriptions.create(&tokens, &params).await {
        Ok(subscription) => {
            info!(
                "subscribed {} to chat {} for guild {}",
                subscription.id, chat_id, guild_id
            );
            Ok(SetConversationOutcome::SavedAndSubscribed)
        }
        Err(err) => {
            warn!("subscription for {} failed: {}", guild_id, err);
            Ok(SetConversationOutcome::SubscriptionFailed(err.to_string()))
        }
    }
}

/// Bind the Discord channel the relay posts into.
pub async fn set_channel(state: &AppState, guild_id: u64, channel_id: Option<u64>) -> Result<()> {
    let mut settings = state.store.get(guild_id).await?;
    settings.teams_channel = channel_id;
    state.store.put(guild_id, &settings).await?;
    Ok(())
}

/// Forget the stored tokens. Channel and chat bindings stay.
pub async fn unauthorize(state: &AppState, guild_id: u64) -> Result<()> {
    let mut settings = state.store.get(guild_id).await?;
    settings.teams_auth = None;
    state.store.put(guild_id, &settings).await?;
    Ok(())
}

/// What the admin status display shows for a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    /// Email from the stored id token, if authorized.
    pub signed_in_as: Option<String>,
    pub channel: Option<u64>,
    pub chat_id: Option<String>,
}

pub async fn bridge_status(state: &AppState, guild_id: u64) -> Result<BridgeStatus> {
    let settings = state.store.get(guild_id).await?;
    let signed_in_as = match &settings.teams_auth {
        Some(auth) => state.auth.decode_id_token(&auth.id_token)?.email,
        None => None,
    };
    Ok(BridgeStatus {
        signed_in_as,
        channel: settings.teams_channel,
        chat_id: settings.teams_chat_id,
    })
}

/// Forward a Discord message into the bound Teams chat.
///
/// Returns `Ok(false)` when the message's channel is not the bridged one
/// or the bridge is not fully configured; errors surface to the caller so
/// the gateway can reply to the message with them.
pub async fn forward_to_teams(
    state: &AppState,
    guild_id: u64,
    channel_id: u64,
    author_name: &str,
    jump_url: &str,
    html_body: &str,
) -> Result<bool> {
    let mut settings = state.store.get(guild_id).await?;
    if settings.teams_channel != Some(channel_id) {
        return Ok(false);
    }
    let (Some(stored), Some(chat_id)) = (
        settings.teams_auth.clone(),
        settings.teams_chat_id.clone(),
    ) else {
        return Ok(false);
    };

    let tokens = state.auth.refresh(&stored).await?;
    if Some(&tokens) != settings.teams_auth.as_ref() {
        settings.teams_auth = Some(tokens.clone());
        state.store.put(guild_id, &settings).await?;
    }

    let composed = translate::compose_teams_html(author_name, jump_url, html_body);
    state.chats.send_message(&tokens, &chat_id, &composed).await?;
    Ok(true)
}
