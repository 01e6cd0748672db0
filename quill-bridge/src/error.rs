//! Error types for the bridge service

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_graph::GraphError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A webhook body that does not have the `{value: [...]}` shape.
    #[error("malformed notification payload: {0}")]
    MalformedNotification(String),

    #[error("another login is already pending for this guild")]
    LoginPending,

    #[error("guild is already authorized")]
    AlreadyAuthorized,

    #[error("no pending login for this guild")]
    NoPendingLogin,

    /// The bound Discord channel no longer exists (or the bot lost it).
    #[error("unknown Discord channel")]
    UnknownChannel,

    #[error("Discord API error: {status}: {body}")]
    Discord { status: u16, body: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        match &self {
            // Malformed payloads get a bare 500; everything else about a
            // notification is acknowledged or silently dropped upstream.
            BridgeError::MalformedNotification(msg) => {
                tracing::warn!("rejecting malformed notification: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            BridgeError::LoginPending | BridgeError::AlreadyAuthorized | BridgeError::NoPendingLogin => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            _ => {
                tracing::error!("internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}
