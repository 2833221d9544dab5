//! Usage: Turn failed Central Server calls into a title + message fit for a notification.

use serde_json::Value;
use std::time::Duration;

const GENERIC_FALLBACK_MESSAGE: &str = "An unexpected error occurred. Please try again.";
const CONNECTION_ERROR_TITLE: &str = "Connection Error";
const CONNECTION_ERROR_MESSAGE: &str =
    "Unable to connect to the server. Please check your internet connection and try again.";

pub const DEFAULT_ERROR_TITLE: &str = "Error";

#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// No response reached us.
    Network { message: String },
    Response {
        status: u16,
        status_text: String,
        body: Option<Value>,
        message: Option<String>,
    },
    Other { message: Option<String> },
}

impl ApiFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiFailure::Response { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            ApiFailure::Network { message } => Some(message),
            ApiFailure::Response { message, .. } | ApiFailure::Other { message } => {
                message.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorContext {
    CreateUser,
    UpdateUser,
    DeleteUser,
    Login,
    UploadFile,
    CreateReport,
    UpdateReport,
}

impl ApiErrorContext {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "createUser" => Self::CreateUser,
            "updateUser" => Self::UpdateUser,
            "deleteUser" => Self::DeleteUser,
            "login" => Self::Login,
            "uploadFile" => Self::UploadFile,
            "createReport" => Self::CreateReport,
            "updateReport" => Self::UpdateReport,
            _ => return None,
        })
    }

    fn message_for(self, status: u16) -> Option<(&'static str, &'static str)> {
        use ApiErrorContext::*;
        Some(match (self, status) {
            (CreateUser, 400) => (
                "Invalid User Information",
                "Please check the username, email, and other details. Username may already exist or contain invalid characters.",
            ),
            (CreateUser, 409) => (
                "User Already Exists",
                "A user with this username or email already exists. Please choose a different username or email.",
            ),
            (CreateUser, 422) => (
                "Invalid User Data",
                "Please ensure all required fields are filled correctly and the password meets requirements.",
            ),
            (UpdateUser, 400) => (
                "Invalid Update Information",
                "Please check the updated information for any errors.",
            ),
            (UpdateUser, 404) => (
                "User Not Found",
                "The user you're trying to update could not be found.",
            ),
            (UpdateUser, 409) => (
                "Update Conflict",
                "The username or email you're trying to use is already taken by another user.",
            ),
            (DeleteUser, 404) => (
                "User Not Found",
                "The user you're trying to delete could not be found.",
            ),
            (DeleteUser, 409) => (
                "Cannot Delete User",
                "This user cannot be deleted because they have associated data or are currently active.",
            ),
            (Login, 401) => (
                "Login Failed",
                "Invalid username or password. Please check your credentials and try again.",
            ),
            (Login, 403) => (
                "Account Disabled",
                "Your account has been disabled. Please contact an administrator.",
            ),
            (Login, 429) => (
                "Too Many Login Attempts",
                "Too many failed login attempts. Please wait before trying again.",
            ),
            (UploadFile, 400) => (
                "Invalid File",
                "The file you're trying to upload is invalid or corrupted.",
            ),
            (UploadFile, 413) => (
                "File Too Large",
                "The file you're trying to upload is too large. Please choose a smaller file.",
            ),
            (UploadFile, 415) => (
                "Unsupported File Type",
                "This file type is not supported. Please choose a different file.",
            ),
            (CreateReport, 400) => (
                "Invalid Report Data",
                "Please check all report fields and ensure the data is valid.",
            ),
            (CreateReport, 409) => (
                "Report Already Exists",
                "A report for this period already exists.",
            ),
            (UpdateReport, 400) => (
                "Invalid Report Update",
                "Please check the report data for any errors.",
            ),
            (UpdateReport, 409) => (
                "Report Cannot Be Updated",
                "This report cannot be updated because it has been finalized or is being reviewed.",
            ),
            _ => return None,
        })
    }
}

fn status_message(status: u16) -> Option<(&'static str, &'static str)> {
    Some(match status {
        400 => (
            "Invalid Input",
            "Please check the information you provided and try again.",
        ),
        401 => ("Authentication Required", "Please log in again to continue."),
        403 => (
            "Access Denied",
            "You don't have permission to perform this action.",
        ),
        404 => ("Not Found", "The requested resource could not be found."),
        409 => ("Conflict", "This action conflicts with existing data."),
        422 => (
            "Validation Error",
            "Please check the information you provided.",
        ),
        429 => (
            "Too Many Requests",
            "Please wait a moment before trying again.",
        ),
        500 => (
            "Server Error",
            "Something went wrong on our end. Please try again later.",
        ),
        502 => (
            "Service Unavailable",
            "The service is temporarily unavailable. Please try again later.",
        ),
        503 => (
            "Service Unavailable",
            "The service is temporarily down for maintenance.",
        ),
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedError {
    pub title: String,
    pub message: String,
    pub is_user_friendly: bool,
}

impl ParsedError {
    /// Generic errors stay on screen longer.
    pub fn auto_close(&self) -> Duration {
        if self.is_user_friendly {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(10)
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn extract_body_detail(body: &Value) -> Option<String> {
    match body {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            for key in ["detail", "message", "error"] {
                if let Some(text) = non_empty_str(map.get(key)) {
                    return Some(text.to_string());
                }
            }

            if let Some(Value::Array(errors)) = map.get("errors") {
                let joined = errors
                    .iter()
                    .map(|err| match err {
                        Value::String(s) => s.clone(),
                        Value::Object(obj) if obj.contains_key("message") => {
                            obj.get("message").map(display_value).unwrap_or_default()
                        }
                        other => display_value(other),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                return Some(joined);
            }

            let fields = map
                .iter()
                .filter(|(key, value)| *key != "detail" && *key != "message" && is_truthy(value))
                .map(|(key, value)| format!("{key}: {}", display_value(value)))
                .collect::<Vec<_>>()
                .join("; ");
            (!fields.is_empty()).then_some(fields)
        }
        _ => None,
    }
}

fn extract_details(failure: &ApiFailure) -> Option<String> {
    if let ApiFailure::Response {
        body: Some(body), ..
    } = failure
    {
        if let Some(detail) = extract_body_detail(body) {
            return Some(detail);
        }
    }
    failure.message().map(str::to_string)
}

pub fn parse_api_error(
    failure: &ApiFailure,
    context: Option<ApiErrorContext>,
    fallback_title: &str,
) -> ParsedError {
    if let ApiFailure::Network { .. } = failure {
        return ParsedError {
            title: CONNECTION_ERROR_TITLE.to_string(),
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            is_user_friendly: true,
        };
    }

    let Some(status) = failure.status() else {
        return ParsedError {
            title: fallback_title.to_string(),
            message: failure
                .message()
                .unwrap_or(GENERIC_FALLBACK_MESSAGE)
                .to_string(),
            is_user_friendly: false,
        };
    };

    let known = context
        .and_then(|ctx| ctx.message_for(status))
        .or_else(|| status_message(status));

    let details = extract_details(failure).filter(|d| !d.is_empty());
    match known {
        Some((title, message)) => ParsedError {
            title: title.to_string(),
            message: details.unwrap_or_else(|| message.to_string()),
            is_user_friendly: true,
        },
        None => ParsedError {
            title: fallback_title.to_string(),
            message: details
                .unwrap_or_else(|| format!("An error occurred ({status}). Please try again.")),
            is_user_friendly: false,
        },
    }
}
