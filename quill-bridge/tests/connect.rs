//! Login and connect operation behavior

mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use mockito::Matcher;
use quill_bridge::connect::{self, SetConversationOutcome};
use quill_bridge::settings::SettingsStore;
use quill_bridge::BridgeError;
use quill_graph::DeviceAuthorization;

fn authorization(expires_offset: i64) -> DeviceAuthorization {
    DeviceAuthorization {
        device_code: "device-123".to_string(),
        user_code: "ABCD-1234".to_string(),
        verification_uri: "https://microsoft.com/devicelogin".to_string(),
        message: "go log in".to_string(),
        interval: 1,
        expires: Utc::now().timestamp() + expires_offset,
    }
}

#[tokio::test]
async fn a_second_login_is_rejected_without_calling_the_provider() {
    let mut server = mockito::Server::new_async().await;
    let (state, _receivers, _store) = common::state(&server);
    let device_code = server
        .mock("POST", "/common/oauth2/v2.0/devicecode")
        .expect(0)
        .create_async()
        .await;

    state.logins.record(42, 7, authorization(900));
    let err = connect::begin_login(&state, 42, 8).await.unwrap_err();

    assert!(matches!(err, BridgeError::LoginPending));
    device_code.assert_async().await;
}

#[tokio::test]
async fn completing_a_login_stores_the_tokens_and_clears_the_session() {
    let mut server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);
    server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(common::TOKEN_BODY)
        .create_async()
        .await;

    state.logins.record(42, 7, authorization(900));
    let tokens = connect::complete_login(&state, 42).await.unwrap();

    assert_eq!(tokens.access_token, "fresh-access");
    let settings = store.get(42).await.unwrap();
    assert_eq!(
        settings.teams_auth.map(|auth| auth.access_token),
        Some("fresh-access".to_string())
    );
    assert!(state.logins.pending(42).is_none());
}

#[tokio::test]
async fn a_failed_subscription_does_not_roll_back_the_saved_chat_id() {
    let mut server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);
    store
        .put(42, &common::bridged_settings("old", 555, 3600))
        .await
        .unwrap();
    server
        .mock("POST", "/subscriptions")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"code": "Forbidden", "message": "no consent"}}"#)
        .create_async()
        .await;

    let outcome = connect::set_conversation(&state, 42, "abc").await.unwrap();

    assert!(matches!(
        outcome,
        SetConversationOutcome::SubscriptionFailed(_)
    ));
    assert_eq!(
        store.get(42).await.unwrap().teams_chat_id.as_deref(),
        Some("abc")
    );
}

#[tokio::test]
async fn setting_a_conversation_before_login_just_saves() {
    let server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);

    let outcome = connect::set_conversation(&state, 42, "abc").await.unwrap();

    assert_eq!(outcome, SetConversationOutcome::Saved);
    assert_eq!(
        store.get(42).await.unwrap().teams_chat_id.as_deref(),
        Some("abc")
    );
}

#[tokio::test]
async fn forwarded_messages_carry_the_origin_marker() {
    let mut server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);
    store
        .put(42, &common::bridged_settings("abc", 555, 3600))
        .await
        .unwrap();
    let post = server
        .mock("POST", "/chats/abc/messages")
        .match_body(Matcher::Regex("from Discord".to_string()))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let sent = connect::forward_to_teams(
        &state,
        42,
        555,
        "alice#0",
        "https://discord.com/channels/1/2/3",
        "<b>hi</b>",
    )
    .await
    .unwrap();

    assert!(sent);
    post.assert_async().await;
}

#[tokio::test]
async fn messages_from_unbridged_channels_are_not_forwarded() {
    let mut server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);
    store
        .put(42, &common::bridged_settings("abc", 555, 3600))
        .await
        .unwrap();
    let post = server
        .mock("POST", "/chats/abc/messages")
        .expect(0)
        .create_async()
        .await;

    let sent = connect::forward_to_teams(
        &state,
        42,
        556,
        "alice#0",
        "https://discord.com/channels/1/2/3",
        "hi",
    )
    .await
    .unwrap();

    assert!(!sent);
    post.assert_async().await;
}

#[tokio::test]
async fn status_shows_the_signed_in_account() {
    let server = mockito::Server::new_async().await;
    let (state, _receivers, store) = common::state(&server);

    let payload = URL_SAFE_NO_PAD.encode(r#"{"email": "admin@example.com"}"#);
    let mut settings = common::bridged_settings("abc", 555, 3600);
    settings.teams_auth.as_mut().unwrap().id_token =
        format!("eyJhbGciOiJub25lIn0.{}.c2ln", payload);
    store.put(42, &settings).await.unwrap();

    let status = connect::bridge_status(&state, 42).await.unwrap();
    assert_eq!(status.signed_in_as.as_deref(), Some("admin@example.com"));
    assert_eq!(status.channel, Some(555));
    assert_eq!(status.chat_id.as_deref(), Some("abc"));
}
