//! Usage: Authenticated client for AI financial insights, chat and service status.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::AiError;
use super::types::{AiStatus, ChatRequest, ChatResponse, InsightsRequest, InsightsResponse};
use crate::oauth::account_link::http_client;
use crate::oauth::AccessTokenProvider;
use crate::settings::ClientSettings;
use crate::shared::error::AppResult;

const INSIGHTS_FAILED: &str = "Failed to generate insights";
const CHAT_FAILED: &str = "Failed to process chat request";
const STATUS_FAILED: &str = "Failed to get AI status";

pub struct AiClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl AiClient {
    pub fn new(endpoint: impl Into<String>, tokens: Arc<dyn AccessTokenProvider>) -> AppResult<Self> {
        Ok(Self::with_http_client(
            http_client(Duration::from_secs(10))?,
            endpoint,
            tokens,
        ))
    }

    pub fn from_settings(
        settings: &ClientSettings,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> AppResult<Self> {
        let http = http_client(Duration::from_secs(u64::from(
            settings.http_connect_timeout_seconds,
        )))?;
        Ok(Self::with_http_client(
            http,
            settings.central_server_endpoint.clone(),
            tokens,
        ))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn ai_url(&self, action: &str) -> String {
        format!("{}/v1/ai/{action}", self.endpoint)
    }

    fn authenticated(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        match self.tokens.authorization_header() {
            Some(value) => builder.header(reqwest::header::AUTHORIZATION, value),
            None => {
                tracing::warn!("no access token available for ai request");
                builder
            }
        }
    }

    async fn post_json<B, T>(&self, action: &str, body: &B, failure: &str) -> Result<T, AiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_string(body)
            .map_err(|e| AiError::InvalidResponse(format!("{failure}: {e}")))?;
        let response = self
            .authenticated(self.http.post(self.ai_url(action)))
            .body(payload)
            .send()
            .await
            .map_err(|e| AiError::Request {
                status: None,
                message: format!("{failure}: {e}"),
            })?;
        read_json(response, action, failure).await
    }

    pub async fn generate_insights(
        &self,
        request: &InsightsRequest,
    ) -> Result<InsightsResponse, AiError> {
        let insights: InsightsResponse = self.post_json("insights", request, INSIGHTS_FAILED).await?;
        tracing::info!(school = %insights.school_name, period = %insights.period, "ai insights generated");
        Ok(insights)
    }

    /// Generates insights only after the status check reports the service available.
    pub async fn fetch_insights(
        &self,
        request: &InsightsRequest,
    ) -> Result<InsightsResponse, AiError> {
        if !self.is_available().await {
            return Err(AiError::Unavailable);
        }
        self.generate_insights(request).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiError> {
        self.post_json("chat", request, CHAT_FAILED).await
    }

    pub async fn status(&self) -> Result<AiStatus, AiError> {
        let response = self
            .authenticated(self.http.get(self.ai_url("status")))
            .send()
            .await
            .map_err(|e| AiError::Request {
                status: None,
                message: format!("{STATUS_FAILED}: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "ai status request failed");
            return Err(AiError::Request {
                status: Some(status.as_u16()),
                message: STATUS_FAILED.to_string(),
            });
        }
        read_json(response, "status", STATUS_FAILED).await
    }

    pub async fn is_available(&self) -> bool {
        match self.status().await {
            Ok(status) => status.is_available(),
            Err(err) => {
                tracing::warn!(error = %err, "ai service is not available");
                false
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    action: &str,
    failure: &str,
) -> Result<T, AiError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| AiError::Request {
        status: Some(status.as_u16()),
        message: format!("{failure}: {e}"),
    })?;
    if !status.is_success() {
        let message = error_message(&body, failure);
        tracing::error!(action, status = status.as_u16(), "ai request failed: {message}");
        return Err(AiError::Request {
            status: Some(status.as_u16()),
            message,
        });
    }
    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(action, error = %e, "ai response did not match the expected shape");
        AiError::InvalidResponse(format!("{failure}: {e}"))
    })
}

/// Validation errors arrive as `detail: [{msg, ..}]`; other errors as `detail: "..."`.
fn error_message(body: &str, fallback: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|mut value| value.get_mut("detail").map(Value::take));
    match detail {
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                fallback.to_string()
            } else {
                messages.join(", ")
            }
        }
        Some(Value::String(detail)) if !detail.trim().is_empty() => detail.trim().to_string(),
        _ => fallback.to_string(),
    }
}
