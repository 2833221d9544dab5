//! Usage: Wire messages of the `/v1/ws/user-updates` socket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserUpdateKind {
    ProfileUpdated,
    AvatarUpdated,
    SignatureUpdated,
    PasswordChanged,
    UserDeactivated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewNotification,
    NotificationArchived,
    NotificationUnarchived,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserManagementKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserDeactivated,
    UserReactivated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchoolManagementKind {
    SchoolCreated,
    SchoolUpdated,
    SchoolDeleted,
    SchoolDeactivated,
    SchoolReactivated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        user_id: String,
        #[serde(default)]
        timestamp: f64,
    },
    UserUpdate {
        update_type: UserUpdateKind,
        user_id: String,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        timestamp: f64,
    },
    Notification {
        notification_type: NotificationKind,
        notification_id: String,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        timestamp: f64,
    },
    UserManagement {
        management_type: UserManagementKind,
        user_id: String,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        timestamp: f64,
    },
    SchoolManagement {
        management_type: SchoolManagementKind,
        school_id: String,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        timestamp: f64,
    },
    Pong {
        #[serde(default)]
        timestamp: Option<f64>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping { timestamp: u64 },
}

// Republished by the bridge, one family per bus.

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub notification_id: String,
    pub data: Map<String, Value>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserManagementEvent {
    pub kind: UserManagementKind,
    pub user_id: String,
    pub data: Map<String, Value>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolManagementEvent {
    pub kind: SchoolManagementKind,
    pub school_id: String,
    pub data: Map<String, Value>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdateEvent {
    pub kind: UserUpdateKind,
    pub user_id: String,
    pub data: Map<String, Value>,
    pub timestamp: f64,
}
