//! Usage: Live updates from the Central Server's user-updates websocket.

pub mod bridge;
pub mod connection;
pub mod handlers;
pub mod messages;

pub use bridge::{Dispatch, EventFamily, RealtimeBridge};
pub use connection::{
    websocket_url, ConnectionStatus, ReconnectPolicy, RealtimeClient, RealtimeHandle,
};
pub use handlers::{
    attach, EventHandlers, ListenerHandle, NotificationHandlers, SchoolManagementHandlers,
    UserManagementHandlers, UserUpdateHandlers,
};
pub use messages::{
    ClientMessage, NotificationEvent, NotificationKind, SchoolManagementEvent,
    SchoolManagementKind, ServerMessage, UserManagementEvent, UserManagementKind,
    UserUpdateEvent, UserUpdateKind,
};
