//! Usage: Client settings (schema + TOML read/write helpers + env overrides).

use crate::oauth::callback::DEFAULT_CALLBACK_PATH;
use crate::oauth::geometry::{DEFAULT_POPUP_HEIGHT, DEFAULT_POPUP_WIDTH};
use crate::oauth::popup::HandshakeConfig;
use crate::shared::blocking;
use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SCHEMA_VERSION: u32 = 1;
pub const ENDPOINT_ENV_VAR: &str = "CENTRAL_SERVER_ENDPOINT";
pub const DEFAULT_CENTRAL_SERVER_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_CALLBACK_PORT: u16 = 37200;
const DEFAULT_CLOSED_POLL_INTERVAL_MS: u32 = 1000;
const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u32 = 5 * 60;
const DEFAULT_FALLBACK_SCREEN_WIDTH: u32 = 1920;
const DEFAULT_FALLBACK_SCREEN_HEIGHT: u32 = 1080;
const DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS: u32 = 10;
const DEFAULT_WEBSOCKET_PING_INTERVAL_SECONDS: u32 = 30;
const DEFAULT_WEBSOCKET_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;
const MIN_CLOSED_POLL_INTERVAL_MS: u32 = 50;
const MAX_CLOSED_POLL_INTERVAL_MS: u32 = 60 * 1000;
const MAX_HANDSHAKE_TIMEOUT_SECONDS: u32 = 60 * 60;
const MAX_HTTP_CONNECT_TIMEOUT_SECONDS: u32 = 120;
const MAX_WEBSOCKET_PING_INTERVAL_SECONDS: u32 = 10 * 60;
const MAX_WEBSOCKET_MAX_RECONNECT_ATTEMPTS: u32 = 50;
const MAX_LOG_RETENTION_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub schema_version: u32,
    pub central_server_endpoint: String,
    pub popup_width: u32,
    pub popup_height: u32,
    pub closed_poll_interval_ms: u32,
    pub handshake_timeout_seconds: u32,
    pub callback_path: String,
    // 0 = always pick a dynamic loopback port.
    pub preferred_callback_port: u16,
    pub fallback_screen_width: u32,
    pub fallback_screen_height: u32,
    pub http_connect_timeout_seconds: u32,
    pub websocket_ping_interval_seconds: u32,
    pub websocket_max_reconnect_attempts: u32,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub log_retention_days: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            central_server_endpoint: DEFAULT_CENTRAL_SERVER_ENDPOINT.to_string(),
            popup_width: DEFAULT_POPUP_WIDTH,
            popup_height: DEFAULT_POPUP_HEIGHT,
            closed_poll_interval_ms: DEFAULT_CLOSED_POLL_INTERVAL_MS,
            handshake_timeout_seconds: DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            preferred_callback_port: DEFAULT_CALLBACK_PORT,
            fallback_screen_width: DEFAULT_FALLBACK_SCREEN_WIDTH,
            fallback_screen_height: DEFAULT_FALLBACK_SCREEN_HEIGHT,
            http_connect_timeout_seconds: DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS,
            websocket_ping_interval_seconds: DEFAULT_WEBSOCKET_PING_INTERVAL_SECONDS,
            websocket_max_reconnect_attempts: DEFAULT_WEBSOCKET_MAX_RECONNECT_ATTEMPTS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

impl ClientSettings {
    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            popup_width: self.popup_width,
            popup_height: self.popup_height,
            closed_poll_interval: Duration::from_millis(u64::from(self.closed_poll_interval_ms)),
            timeout: Duration::from_secs(u64::from(self.handshake_timeout_seconds)),
        }
    }

    /// Unsanitized settings may carry 0 here; that reads as the default interval.
    pub fn websocket_ping_interval(&self) -> Duration {
        let seconds = match self.websocket_ping_interval_seconds {
            0 => DEFAULT_WEBSOCKET_PING_INTERVAL_SECONDS,
            seconds => seconds,
        };
        Duration::from_secs(u64::from(seconds))
    }
}

fn sanitize_handshake_settings(settings: &mut ClientSettings) -> bool {
    let mut changed = false;

    if settings.popup_width == 0 {
        settings.popup_width = DEFAULT_POPUP_WIDTH;
        changed = true;
    }
    if settings.popup_height == 0 {
        settings.popup_height = DEFAULT_POPUP_HEIGHT;
        changed = true;
    }

    let poll = settings
        .closed_poll_interval_ms
        .clamp(MIN_CLOSED_POLL_INTERVAL_MS, MAX_CLOSED_POLL_INTERVAL_MS);
    if poll != settings.closed_poll_interval_ms {
        settings.closed_poll_interval_ms = poll;
        changed = true;
    }

    if settings.handshake_timeout_seconds == 0 {
        settings.handshake_timeout_seconds = DEFAULT_HANDSHAKE_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.handshake_timeout_seconds > MAX_HANDSHAKE_TIMEOUT_SECONDS {
        settings.handshake_timeout_seconds = MAX_HANDSHAKE_TIMEOUT_SECONDS;
        changed = true;
    }

    if !settings.callback_path.starts_with('/') {
        settings.callback_path = format!("/{}", settings.callback_path.trim());
        changed = true;
    }

    changed
}

fn sanitize_connection_settings(settings: &mut ClientSettings) -> bool {
    let mut changed = false;

    let endpoint = settings
        .central_server_endpoint
        .trim()
        .trim_end_matches('/')
        .to_string();
    if endpoint.is_empty() {
        settings.central_server_endpoint = DEFAULT_CENTRAL_SERVER_ENDPOINT.to_string();
        changed = true;
    } else if endpoint != settings.central_server_endpoint {
        settings.central_server_endpoint = endpoint;
        changed = true;
    }

    if settings.http_connect_timeout_seconds == 0 {
        settings.http_connect_timeout_seconds = DEFAULT_HTTP_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.http_connect_timeout_seconds > MAX_HTTP_CONNECT_TIMEOUT_SECONDS {
        settings.http_connect_timeout_seconds = MAX_HTTP_CONNECT_TIMEOUT_SECONDS;
        changed = true;
    }

    if settings.websocket_ping_interval_seconds == 0 {
        settings.websocket_ping_interval_seconds = DEFAULT_WEBSOCKET_PING_INTERVAL_SECONDS;
        changed = true;
    }
    if settings.websocket_ping_interval_seconds > MAX_WEBSOCKET_PING_INTERVAL_SECONDS {
        settings.websocket_ping_interval_seconds = MAX_WEBSOCKET_PING_INTERVAL_SECONDS;
        changed = true;
    }

    // 0 is allowed: never reconnect.
    if settings.websocket_max_reconnect_attempts > MAX_WEBSOCKET_MAX_RECONNECT_ATTEMPTS {
        settings.websocket_max_reconnect_attempts = MAX_WEBSOCKET_MAX_RECONNECT_ATTEMPTS;
        changed = true;
    }

    changed
}

fn sanitize_logging_settings(settings: &mut ClientSettings) -> bool {
    let mut changed = false;

    if settings.log_level.trim().is_empty() {
        settings.log_level = DEFAULT_LOG_LEVEL.to_string();
        changed = true;
    }
    if settings.log_retention_days == 0 {
        settings.log_retention_days = DEFAULT_LOG_RETENTION_DAYS;
        changed = true;
    }
    if settings.log_retention_days > MAX_LOG_RETENTION_DAYS {
        settings.log_retention_days = MAX_LOG_RETENTION_DAYS;
        changed = true;
    }

    changed
}

pub(crate) fn sanitize(settings: &mut ClientSettings) -> bool {
    let mut changed = false;
    changed |= sanitize_handshake_settings(settings);
    changed |= sanitize_connection_settings(settings);
    changed |= sanitize_logging_settings(settings);
    changed
}

fn parse_settings_toml(content: &str) -> AppResult<ClientSettings> {
    toml::from_str(content)
        .map_err(|e| format!("SEC_INVALID_INPUT: failed to parse settings: {e}").into())
}

fn apply_env_overrides(settings: &mut ClientSettings) {
    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV_VAR) {
        let endpoint = endpoint.trim();
        if !endpoint.is_empty() {
            tracing::debug!(endpoint, "central server endpoint overridden from environment");
            settings.central_server_endpoint = endpoint.to_string();
        }
    }
}

/// Reads settings from `path`. A missing file yields defaults.
pub fn read(path: &Path) -> AppResult<ClientSettings> {
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("SYSTEM_ERROR: failed to read settings: {e}"))?;
        parse_settings_toml(&content)?
    } else {
        tracing::debug!(path = %path.display(), "settings file missing; using defaults");
        ClientSettings::default()
    };

    if settings.schema_version > SCHEMA_VERSION {
        tracing::warn!(
            schema_version = settings.schema_version,
            supported = SCHEMA_VERSION,
            "settings written by a newer client; unknown fields ignored"
        );
    }

    apply_env_overrides(&mut settings);
    if sanitize(&mut settings) {
        tracing::warn!(path = %path.display(), "settings contained out-of-range values; clamped");
    }
    Ok(settings)
}

/// Async wrapper over `read` for callers on the runtime.
pub async fn load(path: PathBuf) -> AppResult<ClientSettings> {
    blocking::run("settings_read", move || read(&path)).await
}

pub fn write(path: &Path, settings: &ClientSettings) -> AppResult<ClientSettings> {
    if settings.central_server_endpoint.trim().is_empty() {
        return Err("SEC_INVALID_INPUT: central_server_endpoint must not be empty".into());
    }
    if settings.handshake_timeout_seconds == 0 {
        return Err("SEC_INVALID_INPUT: handshake_timeout_seconds must be >= 1".into());
    }

    let mut next = settings.clone();
    next.schema_version = SCHEMA_VERSION;
    sanitize(&mut next);

    let content = toml::to_string_pretty(&next)
        .map_err(|e| format!("SYSTEM_ERROR: failed to serialize settings: {e}"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("SYSTEM_ERROR: failed to create settings dir: {e}"))?;
    }
    std::fs::write(path, content)
        .map_err(|e| format!("SYSTEM_ERROR: failed to write settings: {e}"))?;
    Ok(next)
}
