//! Usage: AI financial insights and chat against the Central Server.
//!
//! `client` wraps the `/v1/ai` endpoints, `chat` keeps a conversation's transcript.

pub mod chat;
pub mod client;
pub mod error;
pub mod types;

pub use chat::{ChatSession, DEFAULT_MAX_HISTORY};
pub use client::AiClient;
pub use error::AiError;
pub use types::{
    AiFeatures, AiServiceState, AiStatus, ChatMessage, ChatRequest, ChatResponse, ChatRole,
    InsightsRequest, InsightsResponse,
};
