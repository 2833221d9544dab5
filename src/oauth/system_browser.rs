//! Usage: Desktop `PopupHost` backed by the system browser and a loopback callback listener.
//!
//! The authorization URL opens in the default browser. The provider redirects to
//! `http://127.0.0.1:{port}{callback_path}`, which this host serves: it completes the link,
//! posts the `OAUTH_RESULT` message from its own origin and marks the popup closed.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use super::account_link::AccountLinkClient;
use super::callback::{complete_callback, parse_callback_target, post_to_opener};
use super::callback_server::{bind_callback_listener, read_request_target, write_html, BoundCallbackListener};
use super::geometry::ScreenSize;
use super::message::WindowMessage;
use super::popup::{PopupHost, PopupRequest, PopupWindow};
use crate::settings::ClientSettings;
use crate::shared::error::AppResult;
use crate::shared::event_bus::EventBus;
use crate::shared::mutex_ext::MutexExt;

const SUCCESS_HTML: &str =
    "<html><body><h1>Account linked</h1><p>You may close this window.</p></body></html>";
const ERROR_HTML: &str =
    "<html><body><h1>Linking failed</h1><p>You may close this window and retry.</p></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";
const IDLE_HTML: &str =
    "<html><body><h1>No sign-in in progress</h1><p>You may close this window.</p></body></html>";

#[derive(Debug)]
struct ActivePopup {
    provider: String,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct BrowserState {
    active: Mutex<Option<ActivePopup>>,
}

impl BrowserState {
    /// Hands out the active popup to exactly one callback request.
    fn take_active(&self) -> Option<ActivePopup> {
        self.active.lock_or_recover().take()
    }
}

struct BrowserPopup {
    closed: Arc<AtomicBool>,
    state: Arc<BrowserState>,
}

impl PopupWindow for BrowserPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Browser tabs cannot be closed from here; the popup is detached from the listener.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut active = self.state.active.lock_or_recover();
        if active
            .as_ref()
            .is_some_and(|popup| Arc::ptr_eq(&popup.closed, &self.closed))
        {
            *active = None;
        }
    }
}

pub struct SystemBrowserHost {
    origin: String,
    screen: ScreenSize,
    messages: EventBus<WindowMessage>,
    state: Arc<BrowserState>,
    server: JoinHandle<()>,
}

impl SystemBrowserHost {
    pub async fn start(settings: &ClientSettings, client: Arc<AccountLinkClient>) -> AppResult<Self> {
        let listener = bind_callback_listener(settings.preferred_callback_port).await?;
        let origin = format!("http://127.0.0.1:{}", listener.port());
        let messages = EventBus::default();
        let state = Arc::new(BrowserState::default());

        let server = tokio::spawn(serve(
            listener,
            CallbackContext {
                origin: origin.clone(),
                callback_path: settings.callback_path.clone(),
                client,
                messages: messages.clone(),
                state: Arc::clone(&state),
            },
        ));
        tracing::info!(origin = %origin, "oauth callback listener started");

        Ok(Self {
            origin,
            screen: ScreenSize {
                width: settings.fallback_screen_width,
                height: settings.fallback_screen_height,
            },
            messages,
            state,
            server,
        })
    }
}

impl Drop for SystemBrowserHost {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl PopupHost for SystemBrowserHost {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn open_popup(&self, request: &PopupRequest) -> Option<Box<dyn PopupWindow>> {
        if let Err(err) = open_browser(&request.url) {
            tracing::warn!(provider = %request.provider, "system browser launch failed: {err}");
            return None;
        }

        let closed = Arc::new(AtomicBool::new(false));
        let previous = self.state.active.lock_or_recover().replace(ActivePopup {
            provider: request.provider.clone(),
            closed: Arc::clone(&closed),
        });
        if let Some(previous) = previous {
            // Only one redirect can be routed at a time; the older handshake will time out.
            tracing::warn!(provider = %previous.provider, "replacing in-flight oauth popup");
        }

        Some(Box::new(BrowserPopup {
            closed,
            state: Arc::clone(&self.state),
        }))
    }

    fn messages(&self) -> &EventBus<WindowMessage> {
        &self.messages
    }
}

#[derive(Clone)]
struct CallbackContext {
    origin: String,
    callback_path: String,
    client: Arc<AccountLinkClient>,
    messages: EventBus<WindowMessage>,
    state: Arc<BrowserState>,
}

async fn serve(mut listener: BoundCallbackListener, ctx: CallbackContext) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::error!("oauth callback accept failed: {err}");
                return;
            }
        };
        tracing::debug!(peer = %peer, "oauth callback connection");
        tokio::spawn(handle_connection(socket, ctx.clone()));
    }
}

async fn handle_connection(mut socket: tokio::net::TcpStream, ctx: CallbackContext) {
    let target = match read_request_target(&mut socket).await {
        Ok(target) => target,
        Err(err) => {
            tracing::debug!("ignoring oauth callback request: {err}");
            write_html(&mut socket, "400 Bad Request", NOT_FOUND_HTML).await;
            return;
        }
    };
    let params = match parse_callback_target(&target, &ctx.callback_path) {
        Ok(params) => params,
        Err(_) => {
            write_html(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
            return;
        }
    };
    let Some(active) = ctx.state.take_active() else {
        write_html(&mut socket, "409 Conflict", IDLE_HTML).await;
        return;
    };

    let result = complete_callback(
        &ctx.client,
        &active.provider,
        &params,
        &ctx.origin,
        &ctx.callback_path,
    )
    .await;
    if result.success {
        write_html(&mut socket, "200 OK", SUCCESS_HTML).await;
    } else {
        write_html(&mut socket, "400 Bad Request", ERROR_HTML).await;
    }

    // Post before flagging closed so the opener sees the result ahead of the closure.
    post_to_opener(&ctx.messages, &ctx.origin, result);
    active.closed.store(true, Ordering::SeqCst);
}

fn open_browser(url: &str) -> AppResult<()> {
    #[cfg(target_os = "windows")]
    {
        build_windows_open_browser_command(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    Err("SYSTEM_ERROR: browser open is unsupported on this platform"
        .to_string()
        .into())
}

#[cfg(target_os = "windows")]
fn build_windows_open_browser_command(url: &str) -> Command {
    let mut cmd = Command::new("rundll32.exe");
    // `explorer <url>` opens File Explorer for some URL shapes.
    cmd.arg("url.dll,FileProtocolHandler").arg(url);
    cmd
}
