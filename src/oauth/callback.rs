//! Usage: Child side of the popup handshake.
//!
//! The provider redirects the popup to the callback path with `code` or `error`. The callback
//! completes the link on the Central Server and posts an `OAUTH_RESULT` message to the opener.

use reqwest::Url;

use super::account_link::AccountLinkClient;
use super::message::{OAuthResult, WindowMessage};
use crate::shared::error::AppResult;
use crate::shared::event_bus::EventBus;

pub const DEFAULT_CALLBACK_PATH: &str = "/account/oauth-callback";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Parses a request target such as `/account/oauth-callback?code=...`.
pub fn parse_callback_target(target: &str, callback_path: &str) -> AppResult<CallbackParams> {
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| format!("SYSTEM_ERROR: invalid oauth callback target: {e}"))?;

    if url.path() != callback_path {
        return Err("SYSTEM_ERROR: invalid oauth callback path"
            .to_string()
            .into());
    }

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.to_string()),
            "error" => params.error = Some(value.to_string()),
            "error_description" => params.error_description = Some(value.to_string()),
            _ => {}
        }
    }
    Ok(params)
}

pub fn redirect_uri(origin: &str, callback_path: &str) -> String {
    format!("{}{callback_path}", origin.trim_end_matches('/'))
}

/// Turns the redirect parameters into the result reported back to the opener.
pub async fn complete_callback(
    client: &AccountLinkClient,
    provider: &str,
    params: &CallbackParams,
    origin: &str,
    callback_path: &str,
) -> OAuthResult {
    if let Some(error) = params.error.as_deref() {
        tracing::warn!(
            provider,
            error,
            description = params.error_description.as_deref().unwrap_or_default(),
            "oauth provider returned an error"
        );
        return OAuthResult::failed(format!("OAuth error: {error}"));
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.trim().is_empty()) else {
        return OAuthResult::failed("No authorization code received");
    };

    let redirect_uri = redirect_uri(origin, callback_path);
    tracing::debug!(provider, redirect_uri = %redirect_uri, "completing oauth link");
    match client.complete_link(provider, code, &redirect_uri).await {
        Ok(()) => OAuthResult::linked(provider),
        Err(err) => {
            tracing::error!(provider, code = err.code(), "oauth callback failed: {err}");
            OAuthResult::failed(err.to_string())
        }
    }
}

/// Posts the result to the opener's message channel, targeted at `origin`.
pub fn post_to_opener(opener: &EventBus<WindowMessage>, origin: &str, result: OAuthResult) -> usize {
    let delivered = opener.publish(result.into_message(origin));
    if delivered == 0 {
        tracing::warn!("oauth result posted but no opener is listening");
    }
    delivered
}
