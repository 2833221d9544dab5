//! Usage: Loopback HTTP listener that receives the OAuth redirect for desktop handshakes.

use crate::shared::error::AppResult;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug)]
pub(crate) struct BoundCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl BoundCallbackListener {
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    pub(crate) async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        match (self.listener_v4.as_mut(), self.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result,
                    result = v6.accept() => result,
                }
            }
            (Some(v4), None) => v4.accept().await,
            (None, Some(v6)) => v6.accept().await,
            (None, None) => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no callback listener bound",
            )),
        }
    }
}

/// Binds the preferred port on both loopback stacks, falling back to a dynamic port.
pub(crate) async fn bind_callback_listener(preferred_port: u16) -> AppResult<BoundCallbackListener> {
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => Err(format!(
            "SYSTEM_ERROR: oauth callback bind failed: {preferred_err}"
        )
        .into()),
        Err(preferred_err) => match try_bind_on_port(0).await {
            Ok(bound) => {
                tracing::warn!(
                    preferred_port,
                    port = bound.port(),
                    "preferred oauth callback port unavailable; using dynamic port"
                );
                Ok(bound)
            }
            Err(fallback_err) => Err(format!(
                "SYSTEM_ERROR: oauth callback bind failed: {preferred_err}; fallback_dynamic_port: {fallback_err}"
            )
            .into()),
        },
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundCallbackListener, String> {
    if port == 0 {
        return try_bind_dynamic_port().await;
    }

    let mut bind_errors: Vec<String> = Vec::new();
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("::1:{port} ({err})"));
            None
        }
    };
    // The handshake origin is the IPv4 loopback, so v4 is mandatory.
    if listener_v4.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundCallbackListener {
        port,
        listener_v4,
        listener_v6,
    })
}

async fn try_bind_dynamic_port() -> Result<BoundCallbackListener, String> {
    let listener_v4 = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| format!("127.0.0.1:0 ({e})"))?;
    let port = listener_v4
        .local_addr()
        .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
        .port();
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            tracing::debug!(port, "ipv6 loopback callback bind skipped: {err}");
            None
        }
    };
    Ok(BoundCallbackListener {
        port,
        listener_v4: Some(listener_v4),
        listener_v6,
    })
}

/// Reads the request line and returns the target of a `GET` request.
pub(crate) async fn read_request_target(socket: &mut TcpStream) -> AppResult<String> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth callback read failed: {e}"))?;
    if size == 0 {
        return Err("SYSTEM_ERROR: oauth callback request is empty"
            .to_string()
            .into());
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    extract_request_target(&request).map(str::to_string)
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let first = request
        .lines()
        .next()
        .ok_or_else(|| "SYSTEM_ERROR: oauth callback malformed request".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("SYSTEM_ERROR: oauth callback must be GET"
            .to_string()
            .into());
    }
    Ok(target)
}

pub(crate) async fn write_html(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    if let Err(err) = socket.write_all(response.as_bytes()).await {
        tracing::debug!("oauth callback response write failed: {err}");
    }
    let _ = socket.shutdown().await;
}
