//! Usage: Popup OAuth account linking.
//!
//! `popup` drives one handshake to a single settlement via the `session` state machine.
//! `account_link` wraps it with the Central Server's link/unlink endpoints, `callback` is the
//! popup's side of the exchange, and `system_browser` is a desktop host for it.

pub mod account_link;
pub mod callback;
pub(crate) mod callback_server;
pub mod error;
pub mod geometry;
pub mod message;
pub mod popup;
pub mod session;
pub mod system_browser;

pub use account_link::{AccessTokenProvider, AccountLinkClient, SharedAccessToken, StaticAccessToken};
pub use error::OAuthError;
pub use geometry::{PopupGeometry, ScreenSize};
pub use message::{OAuthResult, WindowMessage, OAUTH_RESULT_TYPE};
pub use popup::{open_oauth_popup, HandshakeConfig, PopupHost, PopupRequest, PopupWindow};
pub use session::{HandshakeEvent, HandshakeSession, SessionState, SettledBy, Settlement};
pub use system_browser::SystemBrowserHost;
