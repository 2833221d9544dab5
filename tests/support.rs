#![allow(dead_code)]

use std::ffi::OsString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use central_client_lib::oauth::geometry::ScreenSize;
use central_client_lib::oauth::{PopupHost, PopupRequest, PopupWindow, WindowMessage};
use central_client_lib::EventBus;

pub const HOST_ORIGIN: &str = "https://app.example.com";

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    pub fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    pub fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Shared view of a popup handed out by `FakeHost`.
#[derive(Default)]
pub struct FakePopup {
    closed: AtomicBool,
    close_calls: AtomicUsize,
    posted_on_close: Mutex<Option<serde_json::Value>>,
}

impl FakePopup {
    /// Simulates the user closing the window.
    pub fn close_by_user(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// The popup posts `data` to its opener and closes itself right before the next
    /// closed-check, after the opener last looked for messages.
    pub fn post_then_close(&self, data: serde_json::Value) {
        *self.posted_on_close.lock().expect("posted_on_close") = Some(data);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

struct FakePopupWindow {
    popup: Arc<FakePopup>,
    opener: EventBus<WindowMessage>,
}

impl PopupWindow for FakePopupWindow {
    fn is_closed(&self) -> bool {
        let posted = self.popup.posted_on_close.lock().expect("posted_on_close").take();
        if let Some(data) = posted {
            self.opener.publish(WindowMessage::new(HOST_ORIGIN, data));
            self.popup.closed.store(true, Ordering::SeqCst);
        }
        self.popup.is_closed()
    }

    fn close(&self) {
        self.popup.close_calls.fetch_add(1, Ordering::SeqCst);
        self.popup.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeHost {
    origin: String,
    blocked: bool,
    bus: EventBus<WindowMessage>,
    requests: Mutex<Vec<PopupRequest>>,
    popups: Mutex<Vec<Arc<FakePopup>>>,
    messages_calls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            origin: HOST_ORIGIN.to_string(),
            blocked: false,
            bus: EventBus::default(),
            requests: Mutex::new(Vec::new()),
            popups: Mutex::new(Vec::new()),
            messages_calls: AtomicUsize::new(0),
        }
    }

    pub fn blocking_popups() -> Self {
        Self {
            blocked: true,
            ..Self::new()
        }
    }

    pub fn bus(&self) -> &EventBus<WindowMessage> {
        &self.bus
    }

    pub fn post(&self, data: serde_json::Value) -> usize {
        self.post_from(HOST_ORIGIN, data)
    }

    pub fn post_from(&self, origin: &str, data: serde_json::Value) -> usize {
        self.bus.publish(WindowMessage::new(origin, data))
    }

    pub fn requests(&self) -> Vec<PopupRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn popup(&self, index: usize) -> Arc<FakePopup> {
        Arc::clone(&self.popups.lock().expect("popups")[index])
    }

    pub fn messages_calls(&self) -> usize {
        self.messages_calls.load(Ordering::SeqCst)
    }

    /// Yields until `count` handshakes are listening.
    pub async fn wait_for_listeners(&self, count: usize) {
        for _ in 0..10_000 {
            if self.bus.subscriber_count() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} listeners, saw {}", self.bus.subscriber_count());
    }
}

impl PopupHost for FakeHost {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn screen_size(&self) -> ScreenSize {
        ScreenSize {
            width: 1920,
            height: 1080,
        }
    }

    fn open_popup(&self, request: &PopupRequest) -> Option<Box<dyn PopupWindow>> {
        self.requests.lock().expect("requests").push(request.clone());
        if self.blocked {
            return None;
        }
        let popup = Arc::new(FakePopup::default());
        self.popups.lock().expect("popups").push(Arc::clone(&popup));
        Some(Box::new(FakePopupWindow {
            popup,
            opener: self.bus.clone(),
        }))
    }

    fn messages(&self) -> &EventBus<WindowMessage> {
        self.messages_calls.fetch_add(1, Ordering::SeqCst);
        &self.bus
    }
}

pub fn oauth_result(success: bool, provider: Option<&str>, error: Option<&str>) -> serde_json::Value {
    let mut data = serde_json::json!({ "type": "OAUTH_RESULT", "success": success });
    if let Some(provider) = provider {
        data["provider"] = serde_json::Value::from(provider);
    }
    if let Some(error) = error {
        data["error"] = serde_json::Value::from(error);
    }
    data
}

/// Serves `router` on an ephemeral loopback port and returns its base URL.
pub async fn spawn_mock_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{addr}")
}

pub const FAST_POLL: Duration = Duration::from_millis(20);
