//! Usage: Authenticated websocket to the Central Server's user-updates feed.
//!
//! Contract:
//! - The socket URL is the server endpoint with `http` swapped for `ws`, at
//!   `/v1/ws/user-updates?token=<access token>`.
//! - A `{"type":"ping"}` is sent every ping interval; the matching `pong` logs the round trip.
//! - After a drop the client reconnects with `min(2^n s, 10 s)` backoff, at most
//!   `max_reconnect_attempts` times in a row. It never reconnects without a token or after
//!   close code 4001. A successful open resets the count.
//! - Status transitions are published on a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

use super::bridge::{Dispatch, RealtimeBridge};
use super::messages::ClientMessage;
use crate::oauth::AccessTokenProvider;
use crate::settings::ClientSettings;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_millis;

pub const WEBSOCKET_PATH: &str = "/v1/ws/user-updates";
pub const UNAUTHORIZED_CLOSE_CODE: u16 = 4001;

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Uninstantiated,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninstantiated => "Uninstantiated",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        }
    }
}

pub fn websocket_url(endpoint: &str, token: &str) -> AppResult<String> {
    let base = format!("{}{WEBSOCKET_PATH}", endpoint.trim().trim_end_matches('/'));
    let mut url = reqwest::Url::parse(&base)
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid server endpoint: {e}"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => "",
        other => {
            return Err(format!("SEC_INVALID_INPUT: unsupported endpoint scheme: {other}").into())
        }
    };
    if !scheme.is_empty() && url.set_scheme(scheme).is_err() {
        return Err("SEC_INVALID_INPUT: cannot derive websocket url".into());
    }
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Returns the wait before the next attempt, or `None` to stay closed.
    pub fn next_delay(&mut self, authenticated: bool, close_code: Option<u16>) -> Option<Duration> {
        if !authenticated {
            return None;
        }
        if self.attempts >= self.max_attempts {
            tracing::warn!(max_attempts = self.max_attempts, "max websocket reconnection attempts reached");
            return None;
        }
        if close_code == Some(UNAUTHORIZED_CLOSE_CODE) {
            tracing::warn!("websocket authentication failed, not reconnecting");
            return None;
        }
        self.attempts += 1;
        tracing::info!(
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            "attempting websocket reconnection"
        );
        Some(reconnect_delay(self.attempts))
    }
}

fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
    let ms = (RECONNECT_BASE.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis((RECONNECT_MAX.as_millis() as u64).min(ms))
}

enum SessionEnd {
    Shutdown,
    Dropped { close_code: Option<u16> },
}

pub struct RealtimeClient {
    endpoint: String,
    tokens: Arc<dyn AccessTokenProvider>,
    bridge: Arc<RealtimeBridge>,
    ping_interval: Duration,
    max_reconnect_attempts: u32,
    status: watch::Sender<ConnectionStatus>,
}

impl RealtimeClient {
    pub fn new(
        settings: &ClientSettings,
        tokens: Arc<dyn AccessTokenProvider>,
        bridge: Arc<RealtimeBridge>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Uninstantiated);
        Self {
            endpoint: settings.central_server_endpoint.clone(),
            tokens,
            bridge,
            ping_interval: settings.websocket_ping_interval(),
            max_reconnect_attempts: settings.websocket_max_reconnect_attempts,
            status,
        }
    }

    pub fn bridge(&self) -> &Arc<RealtimeBridge> {
        &self.bridge
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn spawn(self) -> RealtimeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status = self.status();
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });
        RealtimeHandle {
            shutdown: shutdown_tx,
            status,
            task,
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(status = status.label(), "websocket status changed");
        }
    }

    /// Runs until shutdown or until the reconnect policy gives up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut policy = ReconnectPolicy::new(self.max_reconnect_attempts);
        loop {
            let Some(token) = self.tokens.access_token() else {
                tracing::info!("no access token; websocket stays closed");
                self.set_status(ConnectionStatus::Closed);
                return;
            };
            let url = match websocket_url(&self.endpoint, &token) {
                Ok(url) => url,
                Err(err) => {
                    tracing::error!(error = %err, "cannot build websocket url");
                    self.set_status(ConnectionStatus::Closed);
                    return;
                }
            };

            self.set_status(ConnectionStatus::Connecting);
            tracing::debug!(
                endpoint = %self.endpoint,
                token = %mask_token(&token),
                "opening websocket"
            );
            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(url.as_str()) => result,
                _ = shutdown.changed() => {
                    self.set_status(ConnectionStatus::Closed);
                    return;
                }
            };

            let end = match connected {
                Ok((stream, _response)) => {
                    tracing::info!("websocket connection established");
                    policy.on_open();
                    self.set_status(ConnectionStatus::Connected);
                    self.session(stream, &mut shutdown).await
                }
                Err(err) => {
                    tracing::warn!(error = %err, "websocket connect failed");
                    SessionEnd::Dropped { close_code: None }
                }
            };
            self.set_status(ConnectionStatus::Closed);

            let close_code = match end {
                SessionEnd::Shutdown => return,
                SessionEnd::Dropped { close_code } => close_code,
            };
            let authenticated = self.tokens.access_token().is_some();
            let Some(delay) = policy.next_delay(authenticated, close_code) else {
                return;
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    async fn session<S>(
        &self,
        stream: tokio_tungstenite::WebSocketStream<S>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut write, mut read) = stream.split();
        let period = self.ping_interval.max(Duration::from_millis(1));
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_ping_ms: Option<u64> = None;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    self.set_status(ConnectionStatus::Closing);
                    if let Err(err) = write.send(Message::Close(None)).await {
                        tracing::debug!(error = %err, "websocket close frame not sent");
                    }
                    return SessionEnd::Shutdown;
                }
                _ = ping.tick() => {
                    let sent_at = now_unix_millis();
                    let payload = match serde_json::to_string(&ClientMessage::Ping { timestamp: sent_at }) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to encode ping");
                            continue;
                        }
                    };
                    if let Err(err) = write.send(Message::Text(payload)).await {
                        tracing::warn!(error = %err, "failed to send websocket ping");
                        return SessionEnd::Dropped { close_code: None };
                    }
                    last_ping_ms = Some(sent_at);
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match self.bridge.dispatch(&text) {
                        Ok(Dispatch::Pong { .. }) => {
                            if let Some(sent_at) = last_ping_ms {
                                let round_trip_ms = now_unix_millis().saturating_sub(sent_at);
                                tracing::debug!(round_trip_ms, "websocket ping response");
                            }
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "failed to handle websocket message"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let close_code = frame.as_ref().map(|f| u16::from(f.code));
                        tracing::info!(
                            code = ?close_code,
                            reason = frame.as_ref().map(|f| f.reason.to_string()).unwrap_or_default(),
                            "websocket connection closed"
                        );
                        return SessionEnd::Dropped { close_code };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::error!(error = %err, "websocket error");
                        return SessionEnd::Dropped { close_code: None };
                    }
                    None => return SessionEnd::Dropped { close_code: None },
                },
            }
        }
    }
}

/// Dropping the handle also stops the client: the task sees its shutdown channel close,
/// sends a close frame and ends with status `Closed`.
pub struct RealtimeHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "realtime task ended abnormally");
        }
    }
}
