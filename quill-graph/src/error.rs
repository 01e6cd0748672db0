//! Error types for identity platform and Graph calls

use crate::types::ProviderError;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The provider answered with an `{"error": ...}` payload. Recoverable:
    /// callers decide whether to show it to an admin or just log it.
    #[error("provider error: {0}")]
    Provider(ProviderError),

    /// The response violated the expected contract (missing subscription id,
    /// id mismatch on renew, a device code the provider no longer knows).
    /// Something is structurally wrong, not transient.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A non-success status with a body that is not a provider error
    /// payload we can interpret.
    #[error("graph API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
