//! Webhook ingress for Graph change and lifecycle notifications
//!
//! Both endpoints answer the subscription-validation handshake, validate
//! each item's client state against the configured secret, and hand valid
//! items to the relay queues. They always return quickly; all real work
//! happens in the relay workers. Validation failures are deliberately
//! indistinguishable from success to the sender.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::client_state;
use crate::error::{BridgeError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidationQuery {
    #[serde(rename = "validationToken")]
    validation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    value: Vec<JsonValue>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chatMessageNotification", post(chat_message_notification))
        .route("/lifecycleNotification", post(lifecycle_notification))
        .route("/health", get(health_check))
        .route("/_health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

/// POST /chatMessageNotification
async fn chat_message_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidationQuery>,
    body: Bytes,
) -> Result<Response> {
    accept_notifications(&state, query, &body, &state.chat_queue)
}

/// POST /lifecycleNotification
async fn lifecycle_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidationQuery>,
    body: Bytes,
) -> Result<Response> {
    accept_notifications(&state, query, &body, &state.lifecycle_queue)
}

fn accept_notifications(
    state: &AppState,
    query: ValidationQuery,
    body: &[u8],
    queue: &UnboundedSender<JsonValue>,
) -> Result<Response> {
    // Subscription-validation handshake: echo the token, nothing else.
    if let Some(token) = query.validation_token {
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            token,
        )
            .into_response());
    }

    let envelope: NotificationEnvelope = serde_json::from_slice(body)
        .map_err(|err| BridgeError::MalformedNotification(err.to_string()))?;

    for item in envelope.value {
        // Items that fail the client-state check are dropped without any
        // signal to the sender; the response stays an acknowledgement.
        let Some(raw_state) = item.get("clientState").and_then(JsonValue::as_str) else {
            debug!("dropping notification item without clientState");
            continue;
        };
        let Some(parsed) = client_state::parse(raw_state) else {
            debug!("dropping notification item with undecodable clientState");
            continue;
        };
        if parsed.s != state.config.client_state_secret {
            debug!("dropping notification item with foreign clientState");
            continue;
        }
        // Unbounded send: the handler never blocks on the workers.
        let _ = queue.send(item);
    }

    Ok(StatusCode::ACCEPTED.into_response())
}
