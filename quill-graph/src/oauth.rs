//! Device-code OAuth client for the Microsoft identity platform

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::types::{
    DeviceAuthorization, DeviceAuthorizationResponse, IdClaims, ProviderError, TokenResponse,
    TokenSet,
};

pub const DEFAULT_AUTHORITY_BASE: &str = "https://login.microsoftonline.com";

/// Tokens whose expiry is more than this many seconds away are returned
/// as-is by [`Auth::refresh`] without a network round trip. A small safety
/// margin, not an exact boundary.
pub const REFRESH_MARGIN_SECS: i64 = 10;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Scopes appended to every device login; callers must not pass them.
const IMPLIED_SCOPES: [&str; 2] = ["offline_access", "openid"];

/// OAuth client for one application registration.
#[derive(Debug, Clone)]
pub struct Auth {
    client_id: String,
    tenant: String,
    authority: String,
    client: reqwest::Client,
}

impl Auth {
    pub fn new(client_id: String, tenant: String) -> Self {
        Self::with_authority_base(client_id, tenant, DEFAULT_AUTHORITY_BASE)
    }

    /// Build against a non-default authority, e.g. a local test server.
    pub fn with_authority_base(client_id: String, tenant: String, base: &str) -> Self {
        let authority = format!("{}/{}", base, tenant);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client_id,
            tenant,
            authority,
            client,
        }
    }

    /// Start a device-code login.
    ///
    /// `offline_access` and `openid` are appended internally; passing either
    /// in `scopes` is a caller bug and panics. On success the returned
    /// authorization carries an absolute `expires` stamp.
    pub async fn begin_device_login(&self, scopes: &[&str]) -> Result<DeviceAuthorization> {
        assert!(
            !scopes.iter().any(|s| IMPLIED_SCOPES.contains(s)),
            "offline_access and openid are appended automatically"
        );
        let mut scopes: Vec<&str> = scopes.to_vec();
        scopes.extend(IMPLIED_SCOPES);
        let scope = scopes.join(" ");

        let body: JsonValue = self
            .client
            .post(format!("{}/oauth2/v2.0/devicecode", self.authority))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if body.get("error").is_some() {
            return Err(GraphError::Provider(provider_error(body)?));
        }
        let response: DeviceAuthorizationResponse = serde_json::from_value(body)?;
        Ok(DeviceAuthorization {
            device_code: response.device_code,
            user_code: response.user_code,
            verification_uri: response.verification_uri,
            message: response.message,
            interval: response.interval,
            expires: Utc::now().timestamp() + response.expires_in,
        })
    }

    /// Poll the token endpoint until the user completes (or fails) the
    /// device login.
    ///
    /// `authorization_pending` is the only condition that causes a retry,
    /// after sleeping the authorization's `interval`. This is unbounded from
    /// the caller's perspective; session lifetime limits belong to the
    /// caller, which holds the authorization's own `expires`.
    pub async fn poll_device_login(&self, authorization: &DeviceAuthorization) -> Result<TokenSet> {
        loop {
            let body: JsonValue = self
                .client
                .post(format!("{}/oauth2/v2.0/token", self.authority))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("tenant", self.tenant.as_str()),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", authorization.device_code.as_str()),
                ])
                .send()
                .await?
                .json()
                .await?;

            let error = body
                .get("error")
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            match error.as_deref() {
                Some("authorization_pending") => {
                    debug!("device login pending, retrying in {}s", authorization.interval);
                    tokio::time::sleep(Duration::from_secs(authorization.interval)).await;
                }
                // The provider no longer recognizes the device code we hold:
                // our own state is corrupt, not a user-recoverable condition.
                Some("bad_verification_code") => {
                    return Err(GraphError::Protocol(format!(
                        "device code rejected by provider: {}",
                        authorization.device_code
                    )))
                }
                Some(_) => return Err(GraphError::Provider(provider_error(body)?)),
                None => {
                    let response: TokenResponse = serde_json::from_value(body)?;
                    return Ok(response.into_token_set(Utc::now().timestamp()));
                }
            }
        }
    }

    /// Return tokens that are fresh enough to use, refreshing if needed.
    ///
    /// If the record expires more than [`REFRESH_MARGIN_SECS`] from now it
    /// is returned unchanged with no network call. Otherwise a refresh-token
    /// grant produces a brand-new record (including a new, possibly
    /// identical, refresh token) with a freshly stamped expiry.
    pub async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet> {
        if Utc::now().timestamp() + REFRESH_MARGIN_SECS < tokens.expires {
            return Ok(tokens.clone());
        }

        let body: JsonValue = self
            .client
            .post(format!("{}/oauth2/v2.0/token", self.authority))
            .form(&[
                ("tenant", self.tenant.as_str()),
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh_token.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if body.get("error").is_some() {
            return Err(GraphError::Provider(provider_error(body)?));
        }
        let response: TokenResponse = serde_json::from_value(body)?;
        Ok(response.into_token_set(Utc::now().timestamp()))
    }

    /// Decode the claims of an id token without verifying its signature.
    ///
    /// The token only ever comes from the provider's own token response and
    /// is used solely to display the signed-in account, never for
    /// authorization decisions, so signature verification is skipped.
    pub fn decode_id_token(&self, id_token: &str) -> Result<IdClaims> {
        let parts: Vec<&str> = id_token.split('.').collect();
        if parts.len() != 3 {
            return Err(GraphError::Protocol("invalid id token format".to_string()));
        }
        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| GraphError::Protocol(format!("invalid id token payload: {}", e)))?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

/// Interpret an `{"error": ...}` body, however much of it is present.
fn provider_error(body: JsonValue) -> Result<ProviderError> {
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn claims_token(payload: &str) -> String {
        format!(
            "eyJhbGciOiJub25lIn0.{}.c2ln",
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn decodes_id_token_payload() {
        let auth = Auth::new("client".to_string(), "common".to_string());
        let token = claims_token(r#"{"email":"admin@example.com","name":"Admin"}"#);
        let claims = auth.decode_id_token(&token).unwrap();
        assert_eq!(claims.email.as_deref(), Some("admin@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Admin"));
    }

    #[test]
    fn rejects_malformed_id_token() {
        let auth = Auth::new("client".to_string(), "common".to_string());
        assert!(matches!(
            auth.decode_id_token("not-a-jwt"),
            Err(GraphError::Protocol(_))
        ));
    }
}
