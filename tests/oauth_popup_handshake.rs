mod support;

use std::sync::Arc;
use std::time::Duration;

use central_client_lib::oauth::{open_oauth_popup, HandshakeConfig, OAuthError, OAuthResult};
use support::{oauth_result, FakeHost, HOST_ORIGIN};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const POLL: Duration = Duration::from_secs(1);
const TIMEOUT: Duration = Duration::from_secs(300);

fn config() -> HandshakeConfig {
    HandshakeConfig {
        closed_poll_interval: POLL,
        timeout: TIMEOUT,
        ..HandshakeConfig::default()
    }
}

fn start(host: &Arc<FakeHost>, provider: &'static str) -> JoinHandle<Result<OAuthResult, OAuthError>> {
    let host = Arc::clone(host);
    tokio::spawn(async move {
        let config = config();
        open_oauth_popup(host.as_ref(), "https://accounts.example/auth", provider, &config).await
    })
}

#[tokio::test(start_paused = true)]
async fn success_message_resolves_and_closes_popup() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    assert_eq!(host.post(oauth_result(true, Some("google"), None)), 1);

    let result = handshake.await.expect("join").expect("linked");
    assert_eq!(result, OAuthResult::linked("google"));
    let popup = host.popup(0);
    assert!(popup.is_closed());
    assert_eq!(popup.close_calls(), 1);
    assert_eq!(host.bus().subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_carries_error_text() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "github");
    host.wait_for_listeners(1).await;

    host.post(oauth_result(false, None, Some("access_denied")));

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::RemoteFailure("access_denied".to_string()));
    assert_eq!(err.to_string(), "access_denied");
}

#[tokio::test(start_paused = true)]
async fn remote_failure_without_error_uses_generic_message() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "github");
    host.wait_for_listeners(1).await;

    host.post(serde_json::json!({ "type": "OAUTH_RESULT" }));

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err.to_string(), "OAuth linking failed");
}

#[tokio::test(start_paused = true)]
async fn foreign_origin_and_other_types_are_ignored() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.post_from("https://evil.example.com", oauth_result(true, Some("google"), None));
    host.post_from(&format!("{HOST_ORIGIN}/"), oauth_result(true, Some("google"), None));
    host.post(serde_json::json!({ "type": "SOMETHING_ELSE", "success": true }));
    host.post(serde_json::json!("OAUTH_RESULT"));
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!handshake.is_finished());

    host.popup(0).close_by_user();
    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::UserClosedPopup);
}

#[tokio::test(start_paused = true)]
async fn blocked_popup_fails_without_registering_anything() {
    let host = Arc::new(FakeHost::blocking_popups());
    let started = Instant::now();

    let err = open_oauth_popup(host.as_ref(), "https://accounts.example/auth", "google", &config())
        .await
        .expect_err("should fail");

    assert_eq!(err, OAuthError::PopupBlocked);
    assert_eq!(
        err.to_string(),
        "Failed to open popup window. Please allow popups for this site."
    );
    assert_eq!(host.messages_calls(), 0);
    assert_eq!(host.bus().subscriber_count(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn user_close_is_detected_within_one_poll_interval() {
    let host = Arc::new(FakeHost::new());
    let started = Instant::now();
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.popup(0).close_by_user();

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::UserClosedPopup);
    assert_eq!(err.to_string(), "OAuth popup was closed by user");
    assert!(started.elapsed() <= POLL);
    // Already closed by the user; cleanup does not close it again.
    assert_eq!(host.popup(0).close_calls(), 0);
    assert_eq!(host.bus().subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn result_posted_right_before_close_still_wins() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.popup(0).post_then_close(oauth_result(true, Some("google"), None));

    let result = handshake.await.expect("join").expect("queued result should win");
    assert_eq!(result, OAuthResult::linked("google"));
    assert_eq!(host.bus().subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failure_posted_right_before_close_reports_its_error() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "github");
    host.wait_for_listeners(1).await;

    host.post_from("https://evil.example.com", oauth_result(true, Some("github"), None));
    host.popup(0).post_then_close(oauth_result(false, None, Some("access_denied")));

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::RemoteFailure("access_denied".to_string()));
}

#[tokio::test(start_paused = true)]
async fn deadline_times_out_and_force_closes_popup() {
    let host = Arc::new(FakeHost::new());
    let started = Instant::now();
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::HandshakeTimeout);
    assert_eq!(err.to_string(), "OAuth popup timed out");
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(host.popup(0).close_calls(), 1);
    assert_eq!(host.bus().subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn pending_message_wins_when_every_trigger_is_ready() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.popup(0).close_by_user();
    host.post(oauth_result(true, Some("google"), None));
    tokio::time::advance(TIMEOUT + POLL).await;

    let result = handshake.await.expect("join").expect("message should win");
    assert!(result.success);
}

#[tokio::test(start_paused = true)]
async fn closed_popup_wins_over_simultaneous_deadline() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.popup(0).close_by_user();
    tokio::time::advance(TIMEOUT + POLL).await;

    let err = handshake.await.expect("join").expect_err("should fail");
    assert_eq!(err, OAuthError::UserClosedPopup);
}

#[tokio::test(start_paused = true)]
async fn nothing_fires_after_settlement() {
    let host = Arc::new(FakeHost::new());
    let handshake = start(&host, "google");
    host.wait_for_listeners(1).await;

    host.post(oauth_result(true, Some("google"), None));
    handshake.await.expect("join").expect("linked");

    assert_eq!(host.post(oauth_result(false, None, Some("late"))), 0);
    tokio::time::advance(TIMEOUT * 2).await;
    assert_eq!(host.popup(0).close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_handshakes_are_independent() {
    let host = Arc::new(FakeHost::new());
    let first = start(&host, "google");
    let second = start(&host, "google");
    host.wait_for_listeners(2).await;

    let requests = host.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].target, requests[1].target);
    assert!(requests[0].target.starts_with("google_oauth_"));
    assert_eq!(
        requests[0].geometry.features(),
        "width=500,height=600,left=710,top=240,scrollbars=yes,resizable=yes"
    );

    host.popup(0).close_by_user();
    tokio::time::advance(POLL).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        usize::from(first.is_finished()) + usize::from(second.is_finished()),
        1,
        "closing one popup settles only its own handshake"
    );
    assert_eq!(host.bus().subscriber_count(), 1);

    host.popup(1).close_by_user();
    assert_eq!(first.await.expect("join"), Err(OAuthError::UserClosedPopup));
    assert_eq!(second.await.expect("join"), Err(OAuthError::UserClosedPopup));
}
