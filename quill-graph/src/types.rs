//! Wire and domain types for the identity platform and Graph APIs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A complete token record as stored per guild.
///
/// `expires` is an absolute unix timestamp stamped locally as
/// `now + expires_in` when the record is created; the provider's relative
/// value is never stored. Refresh replaces the record wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub token_type: String,
    pub scope: String,
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expires: i64,
}

/// Raw token endpoint response, before the expiry is stamped.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token_type: String,
    pub scope: String,
    pub expires_in: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
}

impl TokenResponse {
    /// Convert to a stored record, stamping an absolute expiry.
    pub(crate) fn into_token_set(self, now: i64) -> TokenSet {
        TokenSet {
            token_type: self.token_type,
            scope: self.scope,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            id_token: self.id_token,
            expires: now + self.expires_in,
        }
    }
}

/// A pending device-code authorization.
///
/// `expires` is absolute, stamped at request time. `message` is the
/// provider's ready-made "go to {url} and enter {code}" text for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub message: String,
    pub interval: u64,
    pub expires: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub message: String,
    pub interval: u64,
    pub expires_in: i64,
}

/// An `{"error": ...}` payload from the token or device-code endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Claims decoded from an id token payload. The signature is not checked;
/// these are display-only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

/// A Graph change-notification subscription as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub client_state: Option<String>,
    #[serde(default)]
    pub notification_url: Option<String>,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    #[serde(default)]
    pub lifecycle_notification_url: Option<String>,
    #[serde(default)]
    pub application_id: Option<String>,
}

/// Parameters for creating (or recreating) a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub notification_url: String,
    pub resource: String,
    pub expiration: chrono::DateTime<chrono::Utc>,
    pub client_state: String,
    pub lifecycle_notification_url: Option<String>,
    pub change_type: String,
}

/// A lifecycle notification item describing the subscription's own state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleNotification {
    pub subscription_id: String,
    #[serde(default)]
    pub subscription_expiration_date_time: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_state: Option<String>,
    pub lifecycle_event: String,
}

/// A chat message fetched from Graph. Only the fields the relay reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub from: Option<MessageSender>,
    #[serde(default)]
    pub body: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageSender {
    #[serde(default)]
    pub user: Option<SenderUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderUser {
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub content_type: String,
    pub content: String,
}
