mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use central_client_lib::oauth::callback::{complete_callback, parse_callback_target, CallbackParams};
use central_client_lib::oauth::{
    AccountLinkClient, HandshakeConfig, OAuthError, OAuthResult, StaticAccessToken,
};
use support::{oauth_result, spawn_mock_server, FakeHost, FAST_POLL, HOST_ORIGIN};

const TOKEN: &str = "tok-123";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer tok-123")
}

async fn login_link(Path(provider): Path<String>) -> (StatusCode, String) {
    match provider.as_str() {
        "google" => (
            StatusCode::OK,
            r#"{"url":"https://accounts.example/auth?client_id=central"}"#.to_string(),
        ),
        "github" => (StatusCode::OK, r#"{"url":""}"#.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
    }
}

async fn unlink(Path(provider): Path<String>, headers: HeaderMap) -> (StatusCode, String) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Not authenticated"}"#.to_string(),
        );
    }
    match provider.as_str() {
        "google" => (StatusCode::OK, "{}".to_string()),
        "github" => (StatusCode::BAD_REQUEST, r#"{"detail":"X"}"#.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>".to_string()),
    }
}

async fn link(
    Path(_provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, String::new());
    }
    let redirect_ok = query.get("redirect_uri").map(String::as_str)
        == Some("https://app.example.com/account/oauth-callback");
    if query.get("code").map(String::as_str) == Some("good") && redirect_ok {
        (StatusCode::OK, r#"{"linked":true}"#.to_string())
    } else {
        (StatusCode::BAD_REQUEST, r#"{"detail":"invalid code"}"#.to_string())
    }
}

async fn central_server() -> String {
    let router = Router::new()
        .route("/v1/auth/oauth/:provider/login/link", get(login_link))
        .route("/v1/auth/oauth/:provider/unlink", get(unlink))
        .route("/v1/auth/oauth/:provider/link", get(link));
    spawn_mock_server(router).await
}

fn client(endpoint: &str) -> Arc<AccountLinkClient> {
    let handshake = HandshakeConfig {
        closed_poll_interval: FAST_POLL,
        timeout: Duration::from_secs(10),
        ..HandshakeConfig::default()
    };
    Arc::new(
        AccountLinkClient::new(endpoint, Arc::new(StaticAccessToken::new(TOKEN)), handshake)
            .expect("client"),
    )
}

#[tokio::test]
async fn link_fails_before_popup_when_url_fetch_is_rejected() {
    let endpoint = central_server().await;
    let client = client(&endpoint);
    let host = FakeHost::new();

    let err = client
        .link_account(&host, "microsoft")
        .await
        .expect_err("should fail");

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "Failed to get OAuth authorization URL");
    assert!(host.requests().is_empty());
    assert_eq!(host.messages_calls(), 0);
}

#[tokio::test]
async fn link_fails_when_no_url_is_returned() {
    let endpoint = central_server().await;
    let client = client(&endpoint);
    let host = FakeHost::new();

    let err = client.link_account(&host, "github").await.expect_err("should fail");

    assert_eq!(err.to_string(), "No OAuth authorization URL received");
    assert!(host.requests().is_empty());
}

#[tokio::test]
async fn link_opens_popup_with_fetched_url_and_resolves_on_result() {
    let endpoint = central_server().await;
    let client = client(&endpoint);
    let host = Arc::new(FakeHost::new());

    let flow = {
        let client = Arc::clone(&client);
        let host = Arc::clone(&host);
        tokio::spawn(async move { client.link_account(host.as_ref(), "google").await })
    };
    host.wait_for_listeners(1).await;

    let requests = host.requests();
    assert_eq!(requests[0].url, "https://accounts.example/auth?client_id=central");
    assert_eq!(requests[0].provider, "google");

    host.post(oauth_result(true, Some("google"), None));
    let result = flow.await.expect("join").expect("linked");
    assert_eq!(result, OAuthResult::linked("google"));
    assert!(host.popup(0).is_closed());
}

#[tokio::test]
async fn unlink_succeeds_with_bearer_token() {
    let endpoint = central_server().await;
    client(&endpoint)
        .unlink_account("google")
        .await
        .expect("unlinked");
}

#[tokio::test]
async fn unlink_error_uses_server_detail() {
    let endpoint = central_server().await;
    let err = client(&endpoint)
        .unlink_account("github")
        .await
        .expect_err("should fail");

    assert_eq!(err.to_string(), "X");
    assert_eq!(
        err,
        OAuthError::Server {
            status: Some(400),
            detail: Some("X".to_string()),
            message: "X".to_string(),
        }
    );
}

#[tokio::test]
async fn unlink_error_without_detail_falls_back_to_status_line() {
    let endpoint = central_server().await;
    let err = client(&endpoint)
        .unlink_account("microsoft")
        .await
        .expect_err("should fail");

    assert_eq!(
        err.to_string(),
        "Failed to unlink microsoft account: 500 Internal Server Error"
    );
}

#[tokio::test]
async fn unlink_without_token_is_rejected() {
    let endpoint = central_server().await;
    let anonymous = AccountLinkClient::new(
        endpoint.as_str(),
        Arc::new(central_client_lib::SharedAccessToken::default()),
        HandshakeConfig::default(),
    )
    .expect("client");

    let err = anonymous
        .unlink_account("google")
        .await
        .expect_err("should fail");
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Not authenticated");
}

#[tokio::test]
async fn transport_failure_has_no_status() {
    // Nothing listens on the discard port.
    let err = client("http://127.0.0.1:9")
        .unlink_account("google")
        .await
        .expect_err("should fail");
    assert_eq!(err.status(), None);
    assert_eq!(err.code(), "OAUTH_SERVER_ERROR");
}

#[tokio::test]
async fn callback_completes_link_with_redirect_uri() {
    let endpoint = central_server().await;
    let client = client(&endpoint);
    let params = parse_callback_target(
        "/account/oauth-callback?code=good&state=s1",
        "/account/oauth-callback",
    )
    .expect("params");

    let result = complete_callback(
        &client,
        "google",
        &params,
        HOST_ORIGIN,
        "/account/oauth-callback",
    )
    .await;
    assert_eq!(result, OAuthResult::linked("google"));
}

#[tokio::test]
async fn callback_reports_link_failure_status() {
    let endpoint = central_server().await;
    let client = client(&endpoint);
    let params = CallbackParams {
        code: Some("stale".to_string()),
        ..CallbackParams::default()
    };

    let result = complete_callback(
        &client,
        "google",
        &params,
        HOST_ORIGIN,
        "/account/oauth-callback",
    )
    .await;
    assert_eq!(
        result,
        OAuthResult::failed("Failed to link account: 400 Bad Request")
    );
}

#[tokio::test]
async fn callback_maps_provider_error_and_missing_code() {
    let client = client("http://127.0.0.1:9");

    let denied = CallbackParams {
        error: Some("access_denied".to_string()),
        error_description: Some("User denied".to_string()),
        ..CallbackParams::default()
    };
    let result = complete_callback(&client, "google", &denied, HOST_ORIGIN, "/account/oauth-callback").await;
    assert_eq!(result, OAuthResult::failed("OAuth error: access_denied"));

    let result = complete_callback(
        &client,
        "google",
        &CallbackParams::default(),
        HOST_ORIGIN,
        "/account/oauth-callback",
    )
    .await;
    assert_eq!(result, OAuthResult::failed("No authorization code received"));
}
