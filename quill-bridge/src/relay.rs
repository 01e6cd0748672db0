//! Background relay workers
//!
//! One single-consumer loop per queue, strict FIFO, one item at a time.
//! The two loops are independent of each other. A failing item is logged
//! and skipped; it never stops the loop.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use quill_graph::LifecycleNotification;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::client_state;
use crate::connect::chat_subscription;
use crate::error::BridgeError;
use crate::translate;
use crate::AppState;

/// Drain the chat-message queue until the channel closes.
pub async fn run_chat_relay(state: Arc<AppState>, mut queue: UnboundedReceiver<JsonValue>) {
    while let Some(item) = queue.recv().await {
        if let Err(err) = relay_chat_message(&state, &item).await {
            error!("error processing chat notification {}: {:#}", item, err);
        }
    }
}

/// Drain the lifecycle queue until the channel closes.
pub async fn run_lifecycle_relay(state: Arc<AppState>, mut queue: UnboundedReceiver<JsonValue>) {
    while let Some(item) = queue.recv().await {
        if let Err(err) = relay_lifecycle_event(&state, &item).await {
            error!("error processing lifecycle event {}: {:#}", item, err);
        }
    }
}

/// Relay one Teams chat message into its guild's Discord channel.
pub async fn relay_chat_message(state: &AppState, item: &JsonValue) -> anyhow::Result<()> {
    let Some(parsed) = item
        .get("clientState")
        .and_then(JsonValue::as_str)
        .and_then(client_state::parse)
    else {
        return Ok(());
    };
    let (Some(guild_id), Some(chat_id)) = (parsed.g, parsed.c) else {
        return Ok(());
    };
    let subscription_id = item
        .get("subscriptionId")
        .and_then(JsonValue::as_str)
        .context("notification has no subscriptionId")?;
    let odata_id = item
        .pointer("/resourceData/@odata.id")
        .and_then(JsonValue::as_str)
        .context("notification has no resourceData.@odata.id")?;

    let mut settings = state.store.get(guild_id).await?;
    let Some(stored) = settings.teams_auth.clone() else {
        // Bridge was disconnected after the subscription was created.
        return Ok(());
    };
    let tokens = match state.auth.refresh(&stored).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!("token refresh failed for guild {}: {}", guild_id, err);
            return Ok(());
        }
    };
    if Some(&tokens) != settings.teams_auth.as_ref() {
        settings.teams_auth = Some(tokens.clone());
        state.store.put(guild_id, &settings).await?;
    }

    if settings.teams_chat_id.as_deref() != Some(chat_id.as_str()) {
        // The admin repointed the bridge; this subscription is orphaned.
        state.subscriptions.remove(&tokens, subscription_id).await?;
        return Ok(());
    }
    let Some(channel_id) = settings.teams_channel else {
        return Ok(());
    };

    let message = match state.chats.get_message(&tokens, odata_id).await {
        Ok(message) => message,
        Err(err) => {
            warn!("fetching message {} failed: {}", odata_id, err);
            return Ok(());
        }
    };
    let Some(body) = message.body else {
        warn!("no body found for {}", odata_id);
        return Ok(());
    };
    let Some(user) = message.from.and_then(|sender| sender.user) else {
        return Ok(());
    };
    if translate::is_discord_origin(&body.content) {
        // One of ours, bounced back by the subscription.
        return Ok(());
    }
    let text = match body.content_type.as_str() {
        "text" => body.content,
        "html" => translate::strip_html(&body.content),
        other => {
            warn!("unknown contentType {:?} for {}", other, odata_id);
            return Ok(());
        }
    };

    let rendered = translate::render_teams_message(&user.display_name, &text);
    match state.discord.send_message(channel_id, &rendered).await {
        Ok(()) => Ok(()),
        Err(BridgeError::UnknownChannel) => {
            // The bound channel is gone; clear it so we stop trying.
            let mut settings = state.store.get(guild_id).await?;
            settings.teams_channel = None;
            state.store.put(guild_id, &settings).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// React to one subscription lifecycle event.
pub async fn relay_lifecycle_event(state: &AppState, item: &JsonValue) -> anyhow::Result<()> {
    let Some(parsed) = item
        .get("clientState")
        .and_then(JsonValue::as_str)
        .and_then(client_state::parse)
    else {
        return Ok(());
    };
    let Some(guild_id) = parsed.g else {
        error!("guild id missing from lifecycle event: {}", item);
        return Ok(());
    };
    let notification: LifecycleNotification = serde_json::from_value(item.clone())?;

    let mut settings = state.store.get(guild_id).await?;
    let (Some(stored), Some(chat_id)) = (
        settings.teams_auth.clone(),
        settings.teams_chat_id.clone(),
    ) else {
        return Ok(());
    };
    let tokens = match state.auth.refresh(&stored).await {
        Ok(tokens) => tokens,
        Err(err) => {
            error!("token refresh failed for guild {}: {}", guild_id, err);
            return Ok(());
        }
    };
    if Some(&tokens) != settings.teams_auth.as_ref() {
        settings.teams_auth = Some(tokens.clone());
        state.store.put(guild_id, &settings).await?;
    }

    if parsed.c.as_deref() != Some(chat_id.as_str()) {
        state
            .subscriptions
            .remove(&tokens, &notification.subscription_id)
            .await?;
        return Ok(());
    }

    let params = chat_subscription(&state.config, guild_id, &chat_id, Utc::now());
    if let Some(new_id) = state
        .subscriptions
        .handle_lifecycle(&tokens, &notification, &params)
        .await?
    {
        // The fresh id is not persisted; future notifications carry it.
        info!("recreated subscription {} for guild {}", new_id, guild_id);
    }
    Ok(())
}
