//! Usage: Link/unlink third-party accounts against the Central Server.
//!
//! Linking fetches an authorization URL and hands it to the popup handshake. Unlinking is a
//! direct authenticated request. Completing a link is what the popup's callback page does
//! after the provider redirects back with a code.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;

use super::error::OAuthError;
use super::message::OAuthResult;
use super::popup::{open_oauth_popup, HandshakeConfig, PopupHost};
use crate::settings::ClientSettings;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::RwLockExt;
use crate::shared::security::{bearer_header, mask_token};

/// Supplies the signed-in user's access token for authenticated requests.
pub trait AccessTokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn authorization_header(&self) -> Option<String> {
        self.access_token().as_deref().and_then(bearer_header)
    }
}

#[derive(Debug, Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenProvider for StaticAccessToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// A token slot updated on login, refresh and logout.
#[derive(Debug, Default)]
pub struct SharedAccessToken {
    token: RwLock<Option<String>>,
}

impl SharedAccessToken {
    pub fn set(&self, token: Option<String>) {
        let token = token.filter(|t| !t.trim().is_empty());
        if let Some(t) = token.as_deref() {
            tracing::debug!(token = %mask_token(t), "access token updated");
        }
        *self.token.write_or_recover() = token;
    }
}

impl AccessTokenProvider for SharedAccessToken {
    fn access_token(&self) -> Option<String> {
        self.token.read_or_recover().clone()
    }
}

pub struct AccountLinkClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn AccessTokenProvider>,
    handshake: HandshakeConfig,
}

pub(crate) fn http_client(connect_timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("central-client/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| format!("SYSTEM_ERROR: http client init failed: {e}").into())
}

impl AccountLinkClient {
    pub fn new(
        endpoint: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
        handshake: HandshakeConfig,
    ) -> AppResult<Self> {
        Ok(Self::with_http_client(
            http_client(Duration::from_secs(10))?,
            endpoint,
            tokens,
            handshake,
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
            settings.handshake_config(),
        ))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
        handshake: HandshakeConfig,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim().trim_end_matches('/').to_string(),
            tokens,
            handshake,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn oauth_url(&self, provider: &str, action: &str) -> String {
        format!("{}/v1/auth/oauth/{provider}/{action}", self.endpoint)
    }

    fn authenticated(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        match self.tokens.authorization_header() {
            Some(value) => builder.header(reqwest::header::AUTHORIZATION, value),
            None => {
                tracing::warn!("no access token available for authenticated oauth request");
                builder
            }
        }
    }

    pub async fn fetch_authorization_url(&self, provider: &str) -> Result<String, OAuthError> {
        let response = self
            .http
            .get(self.oauth_url(provider, "login/link"))
            .send()
            .await
            .map_err(|e| OAuthError::transport("Failed to get OAuth authorization URL", e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(provider, status = status.as_u16(), "authorization url request rejected");
            return Err(OAuthError::server(
                Some(status.as_u16()),
                "Failed to get OAuth authorization URL",
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| OAuthError::transport("Failed to read OAuth authorization URL", e))?;
        serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("url").and_then(Value::as_str).map(str::trim).map(str::to_string))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                OAuthError::server(Some(status.as_u16()), "No OAuth authorization URL received")
            })
    }

    /// Fetches the authorization URL and runs the popup handshake with it.
    pub async fn link_account<H: PopupHost + ?Sized>(
        &self,
        host: &H,
        provider: &str,
    ) -> Result<OAuthResult, OAuthError> {
        let url = self.fetch_authorization_url(provider).await?;
        open_oauth_popup(host, &url, provider, &self.handshake).await
    }

    pub async fn unlink_account(&self, provider: &str) -> Result<(), OAuthError> {
        let response = self
            .authenticated(self.http.get(self.oauth_url(provider, "unlink")))
            .send()
            .await
            .map_err(|e| OAuthError::transport(&format!("Failed to unlink {provider} account"), e))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(provider, "oauth account unlinked");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        let message = detail.clone().unwrap_or_else(|| {
            format!(
                "Failed to unlink {provider} account: {}",
                status_line(status)
            )
        });
        tracing::warn!(provider, status = status.as_u16(), "oauth unlink failed: {message}");
        Err(OAuthError::Server {
            status: Some(status.as_u16()),
            detail,
            message,
        })
    }

    /// Exchanges the provider's authorization code for a linked account (callback side).
    pub async fn complete_link(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(), OAuthError> {
        let response = self
            .authenticated(self.http.get(self.oauth_url(provider, "link")))
            .query(&[("code", code), ("redirect_uri", redirect_uri)])
            .send()
            .await
            .map_err(|e| OAuthError::transport("Failed to link account", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Server {
                status: Some(status.as_u16()),
                detail: extract_detail(&body),
                message: format!("Failed to link account: {}", status_line(status)),
            });
        }
        tracing::info!(provider, "oauth account linked");
        Ok(())
    }
}

fn extract_detail(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}
