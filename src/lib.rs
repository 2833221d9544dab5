//! Central Server client core: popup OAuth account linking, the live user-updates feed and
//! AI insights.

pub mod ai;
mod app;
mod infra;
pub mod oauth;
pub mod realtime;
pub mod shared;

pub use app::logging;
pub use infra::settings;

pub use ai::{AiClient, AiError, ChatSession};
pub use oauth::{
    open_oauth_popup, AccessTokenProvider, AccountLinkClient, HandshakeConfig, OAuthError,
    OAuthResult, PopupHost, PopupWindow, SharedAccessToken, StaticAccessToken, SystemBrowserHost,
    WindowMessage,
};
pub use realtime::{ConnectionStatus, RealtimeBridge, RealtimeClient};
pub use settings::ClientSettings;
pub use shared::api_error::{parse_api_error, ApiErrorContext, ApiFailure, ParsedError};
pub use shared::error::{AppError, AppResult};
pub use shared::event_bus::{EventBus, Subscription};
