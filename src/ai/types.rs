//! Usage: Wire types for the Central Server's `/v1/ai` endpoints.

use serde::{Deserialize, Serialize};

/// Scope of an insights report. Unset fields are omitted and the server picks its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsightsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InsightsResponse {
    pub insights: String,
    pub school_name: String,
    pub period: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<i64>,
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub school_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiServiceState {
    Available,
    Unavailable,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AiFeatures {
    #[serde(default)]
    pub insights: bool,
    #[serde(default)]
    pub chat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AiStatus {
    pub status: AiServiceState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub features: AiFeatures,
}

impl AiStatus {
    pub fn is_available(&self) -> bool {
        self.status == AiServiceState::Available
    }
}
