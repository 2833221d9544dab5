//! Usage: Popup OAuth handshake coordinator.
//!
//! Opens a centered popup for an authorization URL and resolves with whichever terminal
//! trigger fires first: a result message from the popup, the watchdog noticing the popup
//! was closed, or the deadline. The popup, the message subscription and both timers are
//! owned by the handshake and released on every terminal path. A closed popup only counts
//! as a user cancel once no result is left queued.

use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use super::error::OAuthError;
use super::geometry::{PopupGeometry, ScreenSize, DEFAULT_POPUP_HEIGHT, DEFAULT_POPUP_WIDTH};
use super::message::{OAuthResult, WindowMessage};
use super::session::{HandshakeEvent, HandshakeSession, Settlement};
use crate::shared::event_bus::{EventBus, Subscription};

pub const DEFAULT_CLOSED_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A window opened by `PopupHost::open_popup`.
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;
    fn close(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    pub url: String,
    pub target: String,
    pub provider: String,
    pub geometry: PopupGeometry,
}

/// The environment a handshake runs in: a page origin, a screen, a way to open windows
/// and the channel cross-window messages arrive on.
pub trait PopupHost: Send + Sync {
    fn origin(&self) -> String;

    fn screen_size(&self) -> ScreenSize;

    /// Returns `None` when the window could not be opened (e.g. a popup blocker).
    fn open_popup(&self, request: &PopupRequest) -> Option<Box<dyn PopupWindow>>;

    fn messages(&self) -> &EventBus<WindowMessage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub popup_width: u32,
    pub popup_height: u32,
    pub closed_poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            popup_width: DEFAULT_POPUP_WIDTH,
            popup_height: DEFAULT_POPUP_HEIGHT,
            closed_poll_interval: DEFAULT_CLOSED_POLL_INTERVAL,
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

pub async fn open_oauth_popup<H: PopupHost + ?Sized>(
    host: &H,
    url: &str,
    provider: &str,
    config: &HandshakeConfig,
) -> Result<OAuthResult, OAuthError> {
    let mut session = HandshakeSession::new(provider, host.origin());
    let request = PopupRequest {
        url: url.to_string(),
        target: session.popup_target(),
        provider: provider.to_string(),
        geometry: PopupGeometry::centered(
            host.screen_size(),
            config.popup_width,
            config.popup_height,
        ),
    };

    let Some(popup) = host.open_popup(&request) else {
        tracing::warn!(provider, session_id = session.id(), "oauth popup blocked");
        return Err(OAuthError::PopupBlocked);
    };
    tracing::debug!(
        provider,
        session_id = session.id(),
        target = %request.target,
        "oauth popup opened"
    );

    let mut listener = Some(host.messages().subscribe());
    let poll = config.closed_poll_interval.max(Duration::from_millis(1));
    let mut watchdog = interval_at(Instant::now() + poll, poll);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = sleep(config.timeout);
    tokio::pin!(deadline);

    let settlement: Settlement = loop {
        let event = tokio::select! {
            biased;
            received = next_message(&mut listener) => match received {
                Some(message) => HandshakeEvent::Message(message),
                None => {
                    tracing::warn!(session_id = session.id(), "window message channel closed");
                    listener = None;
                    continue;
                }
            },
            _ = watchdog.tick() => {
                let popup_closed = popup.is_closed();
                // A result posted just before the window closed is still queued.
                if popup_closed {
                    if let Some(settlement) = settle_from_queue(&mut session, &mut listener) {
                        break settlement;
                    }
                }
                HandshakeEvent::WatchdogTick { popup_closed }
            },
            _ = &mut deadline => HandshakeEvent::Deadline,
        };
        if let Some(settlement) = session.handle(event) {
            break settlement;
        }
    };

    // Winner's cleanup: listener and both timers go before the popup is closed.
    drop(listener);
    drop(watchdog);
    if !popup.is_closed() {
        popup.close();
    }

    match &settlement.outcome {
        Ok(_) => tracing::info!(
            provider,
            session_id = session.id(),
            settled_by = ?settlement.settled_by,
            "oauth handshake succeeded"
        ),
        Err(err) => tracing::warn!(
            provider,
            session_id = session.id(),
            settled_by = ?settlement.settled_by,
            code = err.code(),
            "oauth handshake failed: {err}"
        ),
    }
    settlement.outcome
}

fn settle_from_queue(
    session: &mut HandshakeSession,
    listener: &mut Option<Subscription<WindowMessage>>,
) -> Option<Settlement> {
    let subscription = listener.as_mut()?;
    while let Some(message) = subscription.try_recv() {
        if let Some(settlement) = session.handle(HandshakeEvent::Message(message)) {
            return Some(settlement);
        }
    }
    None
}

async fn next_message(listener: &mut Option<Subscription<WindowMessage>>) -> Option<WindowMessage> {
    match listener.as_mut() {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
