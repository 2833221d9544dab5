//! Usage: Single-settlement state machine for one popup handshake.
//!
//! Three triggers race to finish a handshake: a result message, the watchdog seeing the
//! popup closed, and the deadline. `handle` turns each trigger into at most one
//! `Settlement`; the `Pending -> Settled` swap is the only transition, so later triggers
//! are inert no matter how they are ordered.

use rand::RngCore;

use super::error::OAuthError;
use super::message::{accept_result, OAuthResult, WindowMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Settled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    Message(WindowMessage),
    WatchdogTick { popup_closed: bool },
    Deadline,
}

/// Which trigger won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettledBy {
    Message,
    Watchdog,
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub settled_by: SettledBy,
    pub outcome: Result<OAuthResult, OAuthError>,
}

#[derive(Debug)]
pub struct HandshakeSession {
    id: String,
    provider: String,
    expected_origin: String,
    state: SessionState,
}

impl HandshakeSession {
    pub fn new(provider: impl Into<String>, expected_origin: impl Into<String>) -> Self {
        Self::with_id(new_session_id(), provider, expected_origin)
    }

    pub fn with_id(
        id: impl Into<String>,
        provider: impl Into<String>,
        expected_origin: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            expected_origin: expected_origin.into(),
            state: SessionState::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        self.state == SessionState::Settled
    }

    /// Popup window name; unique per session so concurrent handshakes never share a window.
    pub fn popup_target(&self) -> String {
        format!("{}_oauth_{}", self.provider, self.id)
    }

    pub fn handle(&mut self, event: HandshakeEvent) -> Option<Settlement> {
        let (settled_by, outcome) = match event {
            HandshakeEvent::Message(message) => {
                let result = accept_result(&message, &self.expected_origin)?;
                let outcome = if result.success {
                    Ok(result)
                } else {
                    Err(OAuthError::RemoteFailure(result.failure_reason()))
                };
                (SettledBy::Message, outcome)
            }
            HandshakeEvent::WatchdogTick { popup_closed: false } => return None,
            HandshakeEvent::WatchdogTick { popup_closed: true } => {
                (SettledBy::Watchdog, Err(OAuthError::UserClosedPopup))
            }
            HandshakeEvent::Deadline => (SettledBy::Deadline, Err(OAuthError::HandshakeTimeout)),
        };

        if std::mem::replace(&mut self.state, SessionState::Settled) == SessionState::Settled {
            return None;
        }
        Some(Settlement {
            settled_by,
            outcome,
        })
    }
}

pub(crate) fn new_session_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
