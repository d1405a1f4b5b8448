//! WebSocket listener using tokio-tungstenite.
//!
//! Signaling events are JSON text frames. The configured cross-origin policy
//! is enforced during the handshake: browser connections carry an `Origin`
//! header that must match the allow-list (or `*`); clients without an
//! `Origin` header are let through.

use callwire_core::{CallwireError, CallwireResult, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    /// The WebSocket stream (written and read by the connection loop).
    pub ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    /// Remote address.
    pub remote_addr: SocketAddr,
}

/// Start the WebSocket listener.
///
/// Returns a receiver that yields accepted connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
    allowed_origins: Vec<String>,
) -> CallwireResult<mpsc::Receiver<WebSocketConnection>> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| CallwireError::Transport(format!("WS bind failed: {e}")))?;

    tracing::info!(addr = %bind_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);
    let allowed = Arc::new(allowed_origins);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    let allowed = allowed.clone();
                    tokio::spawn(async move {
                        let callback = |req: &Request, resp: Response| {
                            let origin =
                                req.headers().get("origin").and_then(|v| v.to_str().ok());
                            if origin_allowed(&allowed, origin) {
                                Ok(resp)
                            } else {
                                warn!(remote = %addr, origin = ?origin, "origin not allowed, rejecting handshake");
                                let mut resp =
                                    ErrorResponse::new(Some("origin not allowed".to_string()));
                                *resp.status_mut() = StatusCode::FORBIDDEN;
                                Err(resp)
                            }
                        };
                        match tokio_tungstenite::accept_hdr_async(stream, callback).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok(rx)
}

/// `*` allows everything; a missing `Origin` header (non-browser client)
/// is always allowed.
fn origin_allowed(allowed: &[String], origin: Option<&str>) -> bool {
    if allowed.iter().any(|o| o == "*") {
        return true;
    }
    match origin {
        None => true,
        Some(o) => allowed.iter().any(|a| a == o),
    }
}

/// Helper: send a server event as a JSON text frame.
pub async fn ws_send_event(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
    event: &ServerEvent,
) -> CallwireResult<()> {
    let text = serde_json::to_string(event)?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| CallwireError::Transport(format!("WS send failed: {e}")))
}

/// Maximum accepted text frame size; signaling payloads are small.
const MAX_WS_FRAME_SIZE: usize = 65_536;

/// Helper: receive the next text frame from a WebSocket.
///
/// Returns `None` if the connection is closed. Binary frames are ignored.
pub async fn ws_recv_text(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
) -> CallwireResult<Option<String>> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > MAX_WS_FRAME_SIZE {
                    return Err(CallwireError::InvalidMessage(format!(
                        "WS frame too large: {} bytes (max {})",
                        text.len(),
                        MAX_WS_FRAME_SIZE
                    )));
                }
                return Ok(Some(text.to_string()));
            }
            Some(Ok(Message::Close(_))) => return Ok(None),
            Some(Ok(Message::Ping(payload))) => {
                // Respond to pings automatically
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Some(Ok(_)) => {
                // Ignore binary and other message types
                continue;
            }
            Some(Err(e)) => {
                return Err(CallwireError::Transport(format!("WS recv failed: {e}")));
            }
            None => return Ok(None),
        }
    }
}
