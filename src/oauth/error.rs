//! Usage: Terminal failure taxonomy for popup handshakes and account link flows.

use crate::shared::api_error::ApiFailure;
use crate::shared::error::AppError;

pub(crate) const POPUP_BLOCKED_MESSAGE: &str =
    "Failed to open popup window. Please allow popups for this site.";
pub(crate) const DEFAULT_REMOTE_FAILURE_MESSAGE: &str = "OAuth linking failed";

/// Every handshake or link flow ends in exactly one of these; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    #[error("Failed to open popup window. Please allow popups for this site.")]
    PopupBlocked,
    #[error("OAuth popup was closed by user")]
    UserClosedPopup,
    #[error("OAuth popup timed out")]
    HandshakeTimeout,
    #[error("{0}")]
    RemoteFailure(String),
    /// HTTP-level failure. `status` is `None` when no response was received.
    #[error("{message}")]
    Server {
        status: Option<u16>,
        detail: Option<String>,
        message: String,
    },
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::PopupBlocked => "OAUTH_POPUP_BLOCKED",
            OAuthError::UserClosedPopup => "OAUTH_POPUP_CLOSED",
            OAuthError::HandshakeTimeout => "OAUTH_TIMEOUT",
            OAuthError::RemoteFailure(_) => "OAUTH_REMOTE_FAILURE",
            OAuthError::Server { .. } => "OAUTH_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            OAuthError::Server { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        OAuthError::Server {
            status,
            detail: None,
            message: message.into(),
        }
    }

    pub(crate) fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        OAuthError::server(None, format!("{context}: {err}"))
    }
}

impl From<OAuthError> for AppError {
    fn from(value: OAuthError) -> Self {
        AppError::new(value.code(), value.to_string())
    }
}

impl From<&OAuthError> for ApiFailure {
    fn from(value: &OAuthError) -> Self {
        match value {
            OAuthError::Server {
                status: None,
                message,
                ..
            } => ApiFailure::Network {
                message: message.clone(),
            },
            OAuthError::Server {
                status: Some(status),
                detail,
                message,
            } => ApiFailure::Response {
                status: *status,
                status_text: String::new(),
                body: detail
                    .as_ref()
                    .map(|d| serde_json::json!({ "detail": d })),
                message: Some(message.clone()),
            },
            other => ApiFailure::Other {
                message: Some(other.to_string()),
            },
        }
    }
}

impl From<OAuthError> for ApiFailure {
    fn from(value: OAuthError) -> Self {
        ApiFailure::from(&value)
    }
}
