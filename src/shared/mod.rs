pub mod api_error;
pub(crate) mod blocking;
pub mod error;
pub mod event_bus;
pub(crate) mod mutex_ext;
pub mod security;
pub(crate) mod time;
