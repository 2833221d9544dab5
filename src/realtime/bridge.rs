//! Usage: Fan incoming socket messages out to typed event buses.
//!
//! Each event family has its own `EventBus`, owned by the bridge and handed to consumers
//! explicitly, so tests can publish and observe without a live socket.

use std::sync::RwLock;

use super::messages::{
    NotificationEvent, SchoolManagementEvent, ServerMessage, UserManagementEvent, UserUpdateEvent,
};
use crate::shared::error::AppResult;
use crate::shared::event_bus::EventBus;
use crate::shared::mutex_ext::RwLockExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    Notification,
    UserManagement,
    SchoolManagement,
    UserUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Delivered { family: EventFamily, receivers: usize },
    ConnectionEstablished { user_id: String },
    Pong { timestamp: Option<f64> },
    /// A user update addressed to someone other than the signed-in user.
    NotForCurrentUser,
    Unknown,
}

#[derive(Debug, Default)]
pub struct RealtimeBridge {
    notifications: EventBus<NotificationEvent>,
    user_management: EventBus<UserManagementEvent>,
    school_management: EventBus<SchoolManagementEvent>,
    user_updates: EventBus<UserUpdateEvent>,
    current_user_id: RwLock<Option<String>>,
}

impl RealtimeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &EventBus<NotificationEvent> {
        &self.notifications
    }

    pub fn user_management(&self) -> &EventBus<UserManagementEvent> {
        &self.user_management
    }

    pub fn school_management(&self) -> &EventBus<SchoolManagementEvent> {
        &self.school_management
    }

    pub fn user_updates(&self) -> &EventBus<UserUpdateEvent> {
        &self.user_updates
    }

    pub fn set_current_user(&self, user_id: Option<String>) {
        *self.current_user_id.write_or_recover() = user_id;
    }

    pub fn current_user(&self) -> Option<String> {
        self.current_user_id.read_or_recover().clone()
    }

    pub fn dispatch(&self, raw: &str) -> AppResult<Dispatch> {
        let message: ServerMessage = serde_json::from_str(raw)
            .map_err(|e| format!("SYSTEM_ERROR: invalid websocket message: {e}"))?;
        Ok(self.dispatch_message(message))
    }

    pub fn dispatch_message(&self, message: ServerMessage) -> Dispatch {
        match message {
            ServerMessage::ConnectionEstablished { user_id, .. } => {
                tracing::info!(user_id = %user_id, "websocket connection established for user");
                Dispatch::ConnectionEstablished { user_id }
            }
            ServerMessage::UserUpdate {
                update_type,
                user_id,
                data,
                timestamp,
            } => {
                if self.current_user().as_deref() != Some(user_id.as_str()) {
                    return Dispatch::NotForCurrentUser;
                }
                tracing::info!(update_type = ?update_type, user_id = %user_id, "received user update");
                let receivers = self.user_updates.publish(UserUpdateEvent {
                    kind: update_type,
                    user_id,
                    data,
                    timestamp,
                });
                Dispatch::Delivered {
                    family: EventFamily::UserUpdate,
                    receivers,
                }
            }
            ServerMessage::Notification {
                notification_type,
                notification_id,
                data,
                timestamp,
            } => {
                tracing::info!(
                    kind = ?notification_type,
                    notification_id = %notification_id,
                    "received notification message"
                );
                let receivers = self.notifications.publish(NotificationEvent {
                    kind: notification_type,
                    notification_id,
                    data,
                    timestamp,
                });
                Dispatch::Delivered {
                    family: EventFamily::Notification,
                    receivers,
                }
            }
            ServerMessage::UserManagement {
                management_type,
                user_id,
                data,
                timestamp,
            } => {
                tracing::info!(kind = ?management_type, user_id = %user_id, "received user management message");
                let receivers = self.user_management.publish(UserManagementEvent {
                    kind: management_type,
                    user_id,
                    data,
                    timestamp,
                });
                Dispatch::Delivered {
                    family: EventFamily::UserManagement,
                    receivers,
                }
            }
            ServerMessage::SchoolManagement {
                management_type,
                school_id,
                data,
                timestamp,
            } => {
                tracing::info!(kind = ?management_type, school_id = %school_id, "received school management message");
                let receivers = self.school_management.publish(SchoolManagementEvent {
                    kind: management_type,
                    school_id,
                    data,
                    timestamp,
                });
                Dispatch::Delivered {
                    family: EventFamily::SchoolManagement,
                    receivers,
                }
            }
            ServerMessage::Pong { timestamp } => Dispatch::Pong { timestamp },
            ServerMessage::Unknown => {
                tracing::debug!("unknown websocket message type");
                Dispatch::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::messages::{NotificationKind, UserUpdateKind};

    #[test]
    fn notification_is_published_to_its_bus() {
        let bridge = RealtimeBridge::new();
        let mut sub = bridge.notifications().subscribe();
        let dispatch = bridge
            .dispatch(r#"{"type":"notification","notification_type":"new_notification","notification_id":"n1","data":{"notification":{"id":"n1"}},"timestamp":1}"#)
            .expect("dispatch");
        assert_eq!(
            dispatch,
            Dispatch::Delivered {
                family: EventFamily::Notification,
                receivers: 1
            }
        );
        let event = sub.try_recv().expect("event");
        assert_eq!(event.kind, NotificationKind::NewNotification);
        assert_eq!(event.notification_id, "n1");
    }

    #[test]
    fn user_update_only_reaches_current_user() {
        let bridge = RealtimeBridge::new();
        let mut sub = bridge.user_updates().subscribe();
        let raw = r#"{"type":"user_update","update_type":"avatar_updated","user_id":"u1","data":{},"timestamp":1}"#;

        assert_eq!(bridge.dispatch(raw).expect("dispatch"), Dispatch::NotForCurrentUser);
        bridge.set_current_user(Some("u2".to_string()));
        assert_eq!(bridge.dispatch(raw).expect("dispatch"), Dispatch::NotForCurrentUser);
        assert!(sub.try_recv().is_none());

        bridge.set_current_user(Some("u1".to_string()));
        assert!(matches!(
            bridge.dispatch(raw).expect("dispatch"),
            Dispatch::Delivered { family: EventFamily::UserUpdate, .. }
        ));
        assert_eq!(sub.try_recv().expect("event").kind, UserUpdateKind::AvatarUpdated);
    }

    #[test]
    fn pong_and_unknown_are_reported_not_published() {
        let bridge = RealtimeBridge::new();
        assert_eq!(
            bridge.dispatch(r#"{"type":"pong","timestamp":5}"#).expect("dispatch"),
            Dispatch::Pong {
                timestamp: Some(5.0)
            }
        );
        assert_eq!(
            bridge.dispatch(r#"{"type":"mystery"}"#).expect("dispatch"),
            Dispatch::Unknown
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        let bridge = RealtimeBridge::new();
        let err = bridge.dispatch("not json").expect_err("should fail");
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }
}
