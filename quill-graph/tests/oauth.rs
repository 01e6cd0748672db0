//! Token endpoint behavior against a mock authority

use chrono::Utc;
use quill_graph::{Auth, DeviceAuthorization, GraphError, TokenSet};

fn tokens(expires: i64) -> TokenSet {
    TokenSet {
        token_type: "Bearer".to_string(),
        scope: "ChatMessage.Send Chat.Read email".to_string(),
        access_token: "old-access".to_string(),
        refresh_token: "old-refresh".to_string(),
        id_token: "old-id".to_string(),
        expires,
    }
}

fn authorization() -> DeviceAuthorization {
    DeviceAuthorization {
        device_code: "device-123".to_string(),
        user_code: "ABCD-1234".to_string(),
        verification_uri: "https://microsoft.com/devicelogin".to_string(),
        message: "go log in".to_string(),
        interval: 1,
        expires: Utc::now().timestamp() + 900,
    }
}

const TOKEN_BODY: &str = r#"{
    "token_type": "Bearer",
    "scope": "ChatMessage.Send Chat.Read email",
    "expires_in": 3600,
    "access_token": "new-access",
    "refresh_token": "new-refresh",
    "id_token": "new-id"
}"#;

#[tokio::test]
async fn refresh_skips_network_for_fresh_tokens() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/common/oauth2/v2.0/token")
        .expect(0)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let current = tokens(Utc::now().timestamp() + 3600);
    let refreshed = auth.refresh(&current).await.unwrap();

    assert_eq!(refreshed, current);
    mock.assert_async().await;
}

#[tokio::test]
async fn refresh_stamps_absolute_expiry() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let before = Utc::now().timestamp();
    let refreshed = auth.refresh(&tokens(before - 100)).await.unwrap();
    let after = Utc::now().timestamp();

    assert_eq!(refreshed.access_token, "new-access");
    assert_eq!(refreshed.refresh_token, "new-refresh");
    // expires is stamped as request time plus expires_in, never the
    // relative value itself
    assert!(refreshed.expires >= before + 3600 - 1);
    assert!(refreshed.expires <= after + 3600 + 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn refresh_surfaces_provider_errors_as_data() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant", "error_description": "revoked"}"#)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let err = auth.refresh(&tokens(0)).await.unwrap_err();

    match err {
        GraphError::Provider(provider) => {
            assert_eq!(provider.error, "invalid_grant");
            assert_eq!(provider.error_description.as_deref(), Some("revoked"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn begin_device_login_stamps_expiry() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/common/oauth2/v2.0/devicecode")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "device_code": "device-123",
                "user_code": "ABCD-1234",
                "verification_uri": "https://microsoft.com/devicelogin",
                "message": "go log in",
                "interval": 5,
                "expires_in": 900
            }"#,
        )
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let before = Utc::now().timestamp();
    let authorization = auth
        .begin_device_login(&["ChatMessage.Send", "Chat.Read", "email"])
        .await
        .unwrap();

    assert_eq!(authorization.user_code, "ABCD-1234");
    assert!(authorization.expires >= before + 900 - 1);
    assert!(authorization.expires <= Utc::now().timestamp() + 900 + 1);
}

#[tokio::test]
#[should_panic(expected = "appended automatically")]
async fn begin_device_login_rejects_implied_scopes() {
    let server = mockito::Server::new_async().await;
    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let _ = auth
        .begin_device_login(&["Chat.Read", "offline_access"])
        .await;
}

#[tokio::test]
async fn poll_returns_stamped_tokens_on_completion() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let before = Utc::now().timestamp();
    let set = auth.poll_device_login(&authorization()).await.unwrap();

    assert_eq!(set.access_token, "new-access");
    assert!(set.expires >= before + 3600 - 1);
}

#[tokio::test]
async fn poll_maps_bad_verification_code_to_protocol_fault() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "bad_verification_code"}"#)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let err = auth.poll_device_login(&authorization()).await.unwrap_err();
    assert!(matches!(err, GraphError::Protocol(_)));
}

#[tokio::test]
async fn poll_surfaces_terminal_provider_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/common/oauth2/v2.0/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "authorization_declined"}"#)
        .create_async()
        .await;

    let auth = Auth::with_authority_base("client".into(), "common".into(), &server.url());
    let err = auth.poll_device_login(&authorization()).await.unwrap_err();
    match err {
        GraphError::Provider(provider) => assert_eq!(provider.error, "authorization_declined"),
        other => panic!("expected provider error, got {other:?}"),
    }
}
