//! Usage: Typed callback sets attached to the bridge's event buses.
//!
//! Each set is built with `on_*` methods and either driven directly with `handle` or attached to
//! a bus with `attach`, which returns a `ListenerHandle`. Dropping the handle deregisters the
//! listener.

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use super::messages::{
    NotificationEvent, NotificationKind, SchoolManagementEvent, SchoolManagementKind,
    UserManagementEvent, UserManagementKind, UserUpdateEvent, UserUpdateKind,
};
use crate::shared::event_bus::EventBus;

type Callback<A> = Box<dyn Fn(A) + Send + Sync>;

pub trait EventHandlers<E>: Send + Sync + 'static {
    /// Returns true when a callback ran for the event.
    fn handle(&self, event: &E) -> bool;

    fn attach(self, bus: &EventBus<E>) -> ListenerHandle
    where
        Self: Sized,
        E: Clone + Send + 'static,
    {
        attach(bus, self)
    }
}

#[must_use = "dropping the handle deregisters the listener"]
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribes before returning, so events published right after `attach` are observed.
pub fn attach<E, H>(bus: &EventBus<E>, handlers: H) -> ListenerHandle
where
    E: Clone + Send + 'static,
    H: EventHandlers<E>,
{
    let mut subscription = bus.subscribe();
    let task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            handlers.handle(&event);
        }
    });
    ListenerHandle { task }
}

fn required_object(data: &Map<String, Value>, key: &str, event: &str) -> Option<Value> {
    match data.get(key) {
        Some(value) if !value.is_null() => Some(value.clone()),
        _ => {
            tracing::warn!(event, key, "realtime event missing required payload");
            None
        }
    }
}

fn invoke<A>(callback: &Option<Callback<A>>, arg: A) -> bool {
    match callback {
        Some(f) => {
            f(arg);
            true
        }
        None => false,
    }
}

#[derive(Default)]
pub struct NotificationHandlers {
    on_new_notification: Option<Callback<Value>>,
    on_notification_archived: Option<Callback<String>>,
    on_notification_unarchived: Option<Callback<String>>,
}

impl NotificationHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives `data.notification`.
    pub fn on_new_notification(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_new_notification = Some(Box::new(f));
        self
    }

    pub fn on_notification_archived(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_notification_archived = Some(Box::new(f));
        self
    }

    pub fn on_notification_unarchived(
        mut self,
        f: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        self.on_notification_unarchived = Some(Box::new(f));
        self
    }
}

impl EventHandlers<NotificationEvent> for NotificationHandlers {
    fn handle(&self, event: &NotificationEvent) -> bool {
        match event.kind {
            NotificationKind::NewNotification => {
                match required_object(&event.data, "notification", "new_notification") {
                    Some(notification) => invoke(&self.on_new_notification, notification),
                    None => false,
                }
            }
            NotificationKind::NotificationArchived => {
                invoke(&self.on_notification_archived, event.notification_id.clone())
            }
            NotificationKind::NotificationUnarchived => {
                invoke(&self.on_notification_unarchived, event.notification_id.clone())
            }
            NotificationKind::Unknown => false,
        }
    }
}

#[derive(Default)]
pub struct UserManagementHandlers {
    on_user_created: Option<Callback<Value>>,
    on_user_updated: Option<Callback<(String, Map<String, Value>)>>,
    on_user_deleted: Option<Callback<String>>,
    on_user_deactivated: Option<Callback<String>>,
    on_user_reactivated: Option<Callback<String>>,
}

impl UserManagementHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives `data.user`.
    pub fn on_user_created(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_user_created = Some(Box::new(f));
        self
    }

    pub fn on_user_updated(
        mut self,
        f: impl Fn((String, Map<String, Value>)) + Send + Sync + 'static,
    ) -> Self {
        self.on_user_updated = Some(Box::new(f));
        self
    }

    pub fn on_user_deleted(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_user_deleted = Some(Box::new(f));
        self
    }

    pub fn on_user_deactivated(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_user_deactivated = Some(Box::new(f));
        self
    }

    pub fn on_user_reactivated(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_user_reactivated = Some(Box::new(f));
        self
    }
}

impl EventHandlers<UserManagementEvent> for UserManagementHandlers {
    fn handle(&self, event: &UserManagementEvent) -> bool {
        let user_id = event.user_id.clone();
        match event.kind {
            UserManagementKind::UserCreated => {
                match required_object(&event.data, "user", "user_created") {
                    Some(user) => invoke(&self.on_user_created, user),
                    None => false,
                }
            }
            UserManagementKind::UserUpdated => {
                invoke(&self.on_user_updated, (user_id, event.data.clone()))
            }
            UserManagementKind::UserDeleted => invoke(&self.on_user_deleted, user_id),
            UserManagementKind::UserDeactivated => invoke(&self.on_user_deactivated, user_id),
            UserManagementKind::UserReactivated => invoke(&self.on_user_reactivated, user_id),
            UserManagementKind::Unknown => false,
        }
    }
}

#[derive(Default)]
pub struct SchoolManagementHandlers {
    on_school_created: Option<Callback<Value>>,
    on_school_updated: Option<Callback<(String, Map<String, Value>)>>,
    on_school_deleted: Option<Callback<String>>,
    on_school_deactivated: Option<Callback<String>>,
    on_school_reactivated: Option<Callback<String>>,
}

impl SchoolManagementHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives `data.school`.
    pub fn on_school_created(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_school_created = Some(Box::new(f));
        self
    }

    pub fn on_school_updated(
        mut self,
        f: impl Fn((String, Map<String, Value>)) + Send + Sync + 'static,
    ) -> Self {
        self.on_school_updated = Some(Box::new(f));
        self
    }

    pub fn on_school_deleted(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_school_deleted = Some(Box::new(f));
        self
    }

    pub fn on_school_deactivated(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_school_deactivated = Some(Box::new(f));
        self
    }

    pub fn on_school_reactivated(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_school_reactivated = Some(Box::new(f));
        self
    }
}

impl EventHandlers<SchoolManagementEvent> for SchoolManagementHandlers {
    fn handle(&self, event: &SchoolManagementEvent) -> bool {
        let school_id = event.school_id.clone();
        match event.kind {
            SchoolManagementKind::SchoolCreated => {
                match required_object(&event.data, "school", "school_created") {
                    Some(school) => invoke(&self.on_school_created, school),
                    None => false,
                }
            }
            SchoolManagementKind::SchoolUpdated => {
                invoke(&self.on_school_updated, (school_id, event.data.clone()))
            }
            SchoolManagementKind::SchoolDeleted => invoke(&self.on_school_deleted, school_id),
            SchoolManagementKind::SchoolDeactivated => {
                invoke(&self.on_school_deactivated, school_id)
            }
            SchoolManagementKind::SchoolReactivated => {
                invoke(&self.on_school_reactivated, school_id)
            }
            SchoolManagementKind::Unknown => false,
        }
    }
}

/// Profile, avatar and signature updates all ask the consumer to refetch the user.
#[derive(Default)]
pub struct UserUpdateHandlers {
    on_refresh_requested: Option<Callback<UserUpdateKind>>,
    on_password_changed: Option<Callback<()>>,
    on_deactivated: Option<Callback<()>>,
}

impl UserUpdateHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_refresh_requested(
        mut self,
        f: impl Fn(UserUpdateKind) + Send + Sync + 'static,
    ) -> Self {
        self.on_refresh_requested = Some(Box::new(f));
        self
    }

    pub fn on_password_changed(mut self, f: impl Fn(()) + Send + Sync + 'static) -> Self {
        self.on_password_changed = Some(Box::new(f));
        self
    }

    pub fn on_deactivated(mut self, f: impl Fn(()) + Send + Sync + 'static) -> Self {
        self.on_deactivated = Some(Box::new(f));
        self
    }
}

impl EventHandlers<UserUpdateEvent> for UserUpdateHandlers {
    fn handle(&self, event: &UserUpdateEvent) -> bool {
        match event.kind {
            UserUpdateKind::ProfileUpdated
            | UserUpdateKind::AvatarUpdated
            | UserUpdateKind::SignatureUpdated => invoke(&self.on_refresh_requested, event.kind),
            UserUpdateKind::PasswordChanged => invoke(&self.on_password_changed, ()),
            UserUpdateKind::UserDeactivated => invoke(&self.on_deactivated, ()),
            UserUpdateKind::Unknown => false,
        }
    }
}
