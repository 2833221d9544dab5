//! Usage: Cross-window message contract between the handshake popup and its opener.
//!
//! The child posts `{ type: "OAUTH_RESULT", success, provider?, error? }` targeted at the
//! opener's origin. Anything from another origin, or with another `type`, is noise.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DEFAULT_REMOTE_FAILURE_MESSAGE;

pub const OAUTH_RESULT_TYPE: &str = "OAUTH_RESULT";

/// One message delivered on the window message channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    pub origin: String,
    pub data: Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OAuthResult {
    pub fn linked(provider: impl Into<String>) -> Self {
        Self {
            success: true,
            provider: Some(provider.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider: None,
            error: Some(error.into()),
        }
    }

    /// The failure reason, falling back to a generic message when the remote sent none.
    pub fn failure_reason(&self) -> String {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_REMOTE_FAILURE_MESSAGE)
            .to_string()
    }

    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::json!({
            "type": OAUTH_RESULT_TYPE,
            "success": self.success,
        });
        if let Some(map) = payload.as_object_mut() {
            if let Some(provider) = self.provider.as_deref() {
                map.insert("provider".to_string(), Value::from(provider));
            }
            if let Some(error) = self.error.as_deref() {
                map.insert("error".to_string(), Value::from(error));
            }
        }
        payload
    }

    pub fn into_message(self, origin: impl Into<String>) -> WindowMessage {
        WindowMessage::new(origin, self.to_payload())
    }
}

/// Returns the handshake result carried by `message`, or `None` if it must be ignored.
///
/// The origin check is an exact string comparison against the opener's own origin.
pub(crate) fn accept_result(message: &WindowMessage, expected_origin: &str) -> Option<OAuthResult> {
    if message.origin != expected_origin {
        return None;
    }
    if message.data.get("type").and_then(Value::as_str) != Some(OAUTH_RESULT_TYPE) {
        return None;
    }

    let data = &message.data;
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    Some(OAuthResult {
        success: data.get("success").and_then(Value::as_bool).unwrap_or(false),
        provider: text("provider"),
        error: text("error"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORIGIN: &str = "https://app.example.org";

    #[test]
    fn accepts_result_from_own_origin() {
        let msg = WindowMessage::new(
            ORIGIN,
            json!({"type": "OAUTH_RESULT", "success": true, "provider": "google"}),
        );
        assert_eq!(accept_result(&msg, ORIGIN), Some(OAuthResult::linked("google")));
    }

    #[test]
    fn rejects_foreign_origin_even_with_valid_payload() {
        let msg = WindowMessage::new(
            "https://evil.example.org",
            json!({"type": "OAUTH_RESULT", "success": true, "provider": "google"}),
        );
        assert_eq!(accept_result(&msg, ORIGIN), None);

        let near_miss = WindowMessage::new(
            "https://app.example.org:443",
            json!({"type": "OAUTH_RESULT", "success": true}),
        );
        assert_eq!(accept_result(&near_miss, ORIGIN), None);
    }

    #[test]
    fn rejects_other_message_types() {
        for data in [
            json!({"type": "WEBPACK_HMR", "success": true}),
            json!({"success": true}),
            json!("OAUTH_RESULT"),
            json!({"type": 7}),
        ] {
            assert_eq!(accept_result(&WindowMessage::new(ORIGIN, data), ORIGIN), None);
        }
    }

    #[test]
    fn missing_success_flag_counts_as_failure() {
        let msg = WindowMessage::new(ORIGIN, json!({"type": "OAUTH_RESULT"}));
        let result = accept_result(&msg, ORIGIN).expect("accepted");
        assert!(!result.success);
        assert_eq!(result.failure_reason(), "OAuth linking failed");
    }

    #[test]
    fn payload_matches_wire_shape() {
        let payload = OAuthResult::failed("access_denied").to_payload();
        assert_eq!(
            payload,
            json!({"type": "OAUTH_RESULT", "success": false, "error": "access_denied"})
        );
    }
}
