//! Usage: A running AI chat conversation with bounded history.

use std::sync::Arc;

use super::client::AiClient;
use super::error::AiError;
use super::types::{ChatMessage, ChatRequest};

pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Keeps the transcript and sends the most recent turns as context with every message.
/// A failed send leaves the transcript as it was before the call.
pub struct ChatSession {
    client: Arc<AiClient>,
    school_id: Option<i64>,
    max_history: usize,
    messages: Vec<ChatMessage>,
    school_name: Option<String>,
}

impl ChatSession {
    pub fn new(client: Arc<AiClient>) -> Self {
        Self {
            client,
            school_id: None,
            max_history: DEFAULT_MAX_HISTORY,
            messages: Vec::new(),
            school_name: None,
        }
    }

    pub fn for_school(mut self, school_id: i64) -> Self {
        self.school_id = Some(school_id);
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn school_name(&self) -> Option<&str> {
        self.school_name.as_deref()
    }

    /// Sends `message` and returns the assistant's reply. Blank messages are ignored.
    pub async fn send(&mut self, message: &str) -> Result<Option<&ChatMessage>, AiError> {
        if message.trim().is_empty() {
            return Ok(None);
        }

        let start = self.messages.len().saturating_sub(self.max_history);
        let request = ChatRequest {
            message: message.to_string(),
            school_id: self.school_id,
            conversation_history: self.messages[start..].to_vec(),
        };
        self.messages.push(ChatMessage::user(message));

        let outcome = self.client.chat(&request).await;
        match outcome {
            Ok(response) => {
                self.messages.push(ChatMessage::assistant(response.response));
                self.school_name = Some(response.school_name);
                Ok(self.messages.last())
            }
            Err(err) => {
                self.messages.pop();
                tracing::error!(code = err.code(), "failed to send chat message: {err}");
                Err(err)
            }
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.school_name = None;
    }
}
