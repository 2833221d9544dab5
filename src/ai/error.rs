//! Usage: Failures of AI insight and chat requests.

use crate::shared::api_error::ApiFailure;
use crate::shared::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AiError {
    #[error("AI service is not available")]
    Unavailable,
    /// `status` is `None` when no response was received.
    #[error("{message}")]
    Request { status: Option<u16>, message: String },
    #[error("{0}")]
    InvalidResponse(String),
}

impl AiError {
    pub fn code(&self) -> &'static str {
        match self {
            AiError::Unavailable => "AI_UNAVAILABLE",
            AiError::Request { .. } => "AI_REQUEST_FAILED",
            AiError::InvalidResponse(_) => "AI_INVALID_RESPONSE",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::Request { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<AiError> for AppError {
    fn from(value: AiError) -> Self {
        AppError::new(value.code(), value.to_string())
    }
}

impl From<&AiError> for ApiFailure {
    fn from(value: &AiError) -> Self {
        match value {
            AiError::Request {
                status: None,
                message,
            } => ApiFailure::Network {
                message: message.clone(),
            },
            AiError::Request {
                status: Some(status),
                message,
            } => ApiFailure::Response {
                status: *status,
                status_text: String::new(),
                body: Some(serde_json::json!({ "detail": message })),
                message: Some(message.clone()),
            },
            other => ApiFailure::Other {
                message: Some(other.to_string()),
            },
        }
    }
}
