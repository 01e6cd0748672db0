//! Graph change-notification subscription management

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::oauth::Auth;
use crate::types::{CreateSubscription, LifecycleNotification, ProviderError, Subscription, TokenSet};

/// Lifecycle event asking us to re-confirm an existing subscription.
const EVENT_REAUTHORIZATION_REQUIRED: &str = "reauthorizationRequired";
/// Lifecycle event telling us the subscription is gone.
const EVENT_SUBSCRIPTION_REMOVED: &str = "subscriptionRemoved";

/// Client for the Graph subscriptions collection.
///
/// Every operation passes the caller's tokens through [`Auth::refresh`]
/// first; callers that persist refreshed tokens do their own refresh before
/// calling here, which makes the internal one a no-op margin check.
#[derive(Debug, Clone)]
pub struct Subscriptions {
    graph_base: String,
    auth: Auth,
    client: reqwest::Client,
}

impl Subscriptions {
    pub fn new(graph_base: String, auth: Auth) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            graph_base,
            auth,
            client,
        }
    }

    async fn bearer(&self, tokens: &TokenSet) -> Result<String> {
        let fresh = self.auth.refresh(tokens).await?;
        Ok(format!("Bearer {}", fresh.access_token))
    }

    /// Create a subscription. A response without an `id` is a protocol
    /// fault, distinct from a well-formed provider error.
    pub async fn create(
        &self,
        tokens: &TokenSet,
        params: &CreateSubscription,
    ) -> Result<Subscription> {
        let mut data = json!({
            "changeType": params.change_type,
            "notificationUrl": params.notification_url,
            "resource": params.resource,
            "expirationDateTime": format_expiration(params.expiration),
            "clientState": params.client_state,
        });
        if let Some(lifecycle_url) = &params.lifecycle_notification_url {
            data["lifecycleNotificationUrl"] = json!(lifecycle_url);
        }

        let body: JsonValue = self
            .client
            .post(format!("{}/subscriptions", self.graph_base))
            .header("Authorization", self.bearer(tokens).await?)
            .json(&data)
            .send()
            .await?
            .json()
            .await?;

        if body.get("error").is_some() {
            return Err(GraphError::Provider(graph_provider_error(&body)));
        }
        if body.get("id").is_none() {
            return Err(GraphError::Protocol(format!(
                "create subscription response has no id: {}",
                body
            )));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Extend an existing subscription. The response must echo the id we
    /// renewed; a mismatch is a protocol fault.
    pub async fn renew(
        &self,
        tokens: &TokenSet,
        id: &str,
        expiration: DateTime<Utc>,
    ) -> Result<Subscription> {
        let body: JsonValue = self
            .client
            .patch(format!("{}/subscriptions/{}", self.graph_base, id))
            .header("Authorization", self.bearer(tokens).await?)
            .json(&json!({ "expirationDateTime": format_expiration(expiration) }))
            .send()
            .await?
            .json()
            .await?;

        if body.get("error").is_some() {
            return Err(GraphError::Provider(graph_provider_error(&body)));
        }
        let subscription: Subscription = serde_json::from_value(body)?;
        if subscription.id != id {
            return Err(GraphError::Protocol(format!(
                "renewed subscription id {} does not match requested {}",
                subscription.id, id
            )));
        }
        Ok(subscription)
    }

    /// Delete a subscription. Success is exactly a no-content response.
    pub async fn remove(&self, tokens: &TokenSet, id: &str) -> Result<bool> {
        let response = self
            .client
            .delete(format!("{}/subscriptions/{}", self.graph_base, id))
            .header("Authorization", self.bearer(tokens).await?)
            .send()
            .await?;
        Ok(response.status() == reqwest::StatusCode::NO_CONTENT)
    }

    /// React to a lifecycle notification.
    ///
    /// `reauthorizationRequired` renews the subscription id carried in the
    /// notification; `subscriptionRemoved` recreates the subscription from
    /// `params` and returns the new id (which is not persisted anywhere —
    /// future notifications carry it). Unknown events are ignored.
    pub async fn handle_lifecycle(
        &self,
        tokens: &TokenSet,
        notification: &LifecycleNotification,
        params: &CreateSubscription,
    ) -> Result<Option<String>> {
        match notification.lifecycle_event.as_str() {
            EVENT_REAUTHORIZATION_REQUIRED => {
                self.renew(tokens, &notification.subscription_id, params.expiration)
                    .await?;
                Ok(None)
            }
            EVENT_SUBSCRIPTION_REMOVED => {
                let subscription = self.create(tokens, params).await?;
                Ok(Some(subscription.id))
            }
            other => {
                debug!("ignoring lifecycle event {:?}", other);
                Ok(None)
            }
        }
    }
}

/// ISO-8601 UTC with a trailing `Z`, the format Graph expects.
pub fn format_expiration(expiration: DateTime<Utc>) -> String {
    expiration.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Graph nests its error payloads (`{"error": {"code", "message"}}`),
/// unlike the flat token endpoint errors.
fn graph_provider_error(body: &JsonValue) -> ProviderError {
    let error = &body["error"];
    ProviderError {
        error: error
            .get("code")
            .and_then(JsonValue::as_str)
            .unwrap_or("unknown")
            .to_string(),
        error_description: error
            .get("message")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    }
}
