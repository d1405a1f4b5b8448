//! Core server: accepts connections and drives the signal router.
//!
//! Owns the router, the HTTP side (ICE proxy + health), and the lifecycle of
//! every WebSocket connection. Each connection gets a monotonic [`ConnId`]
//! and an outbound queue drained by its own loop, so routing never blocks on
//! a slow peer.

use crate::config::ServerConfig;
use crate::http::{self, HttpState};
use crate::ice::IceClient;
use crate::relay::{ConnId, SignalRouter};
use crate::transport::websocket;
use callwire_core::{CallwireError, CallwireResult, ClientEvent, ServerEvent};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The callwire server instance.
pub struct SignalServer {
    config: ServerConfig,
    router: SignalRouter,
    /// Monotonic connection ID counter.
    next_conn_id: AtomicU64,
}

impl SignalServer {
    pub fn new(config: ServerConfig) -> Self {
        let router = SignalRouter::new(config.retry_interval);
        Self {
            config,
            router,
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Start both listeners and serve until ctrl-c.
    pub async fn run(self) -> CallwireResult<()> {
        let server = Arc::new(self);

        let ws_addr: SocketAddr = format!("0.0.0.0:{}", server.config.ws_port)
            .parse()
            .map_err(|e| CallwireError::Config(format!("invalid address: {e}")))?;
        let http_addr: SocketAddr = format!("0.0.0.0:{}", server.config.http_port)
            .parse()
            .map_err(|e| CallwireError::Config(format!("invalid address: {e}")))?;

        let mut ws_rx =
            websocket::start_listener(ws_addr, server.config.allowed_origins.clone()).await?;

        let http_state = Arc::new(HttpState {
            router: server.router.clone(),
            ice: server.config.ice.clone().map(IceClient::new),
        });
        let app = http::build_router(http_state, &server.config.allowed_origins);
        tokio::spawn(async move {
            if let Err(e) = http::serve(http_addr, app).await {
                warn!(error = %e, "HTTP listener stopped");
            }
        });

        info!(
            ws_port = server.config.ws_port,
            http_port = server.config.http_port,
            ice_proxy = server.config.ice.is_some(),
            "callwire-server ready"
        );

        loop {
            tokio::select! {
                Some(conn) = ws_rx.recv() => {
                    let id = ConnId(server.next_conn_id.fetch_add(1, Ordering::Relaxed));
                    let srv = server.clone();
                    tokio::spawn(async move {
                        srv.handle_connection(id, conn).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        server.router.shutdown().await;
        Ok(())
    }

    /// Drive one connection from accept to cleanup.
    async fn handle_connection(&self, id: ConnId, mut conn: websocket::WebSocketConnection) {
        info!(conn = %id, remote = %conn.remote_addr, "peer connected");

        let (tx, peer_rx) = mpsc::channel::<ServerEvent>(64);
        self.router.connect(id, tx).await;

        if let Err(e) = self.connection_loop(id, &mut conn, peer_rx).await {
            debug!(conn = %id, error = %e, "connection ended with error");
        }

        self.router.disconnect(id).await;
        info!(conn = %id, "peer disconnected");
    }

    /// Pump inbound frames into the router and outbound events to the socket.
    async fn connection_loop(
        &self,
        id: ConnId,
        conn: &mut websocket::WebSocketConnection,
        mut peer_rx: mpsc::Receiver<ServerEvent>,
    ) -> CallwireResult<()> {
        loop {
            tokio::select! {
                Some(event) = peer_rx.recv() => {
                    websocket::ws_send_event(&mut conn.ws_stream, &event).await?;
                }
                frame = websocket::ws_recv_text(&mut conn.ws_stream) => {
                    match frame? {
                        Some(text) => self.dispatch(id, &text).await,
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse and route a single inbound frame. Malformed frames are dropped.
    async fn dispatch(&self, id: ConnId, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(ClientEvent::Register(payload)) => {
                self.router.handle_register(id, &payload).await;
            }
            Ok(ClientEvent::Signal(payload)) => {
                self.router.handle_signal(id, payload).await;
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "unparsable client event, dropped");
            }
        }
    }
}
