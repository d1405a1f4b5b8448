//! HTTP listener: the ICE credential proxy and a health endpoint.
//!
//! Runs beside the WebSocket listener on its own port. Handlers only read
//! relay counters; nothing here takes part in routing.

use crate::ice::IceClient;
use crate::relay::SignalRouter;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use callwire_core::{CallwireError, CallwireResult};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

pub struct HttpState {
    pub router: SignalRouter,
    pub ice: Option<IceClient>,
}

/// Build the axum router with CORS applied from the allow-list.
pub fn build_router(state: Arc<HttpState>, allowed_origins: &[String]) -> axum::Router {
    let cors = if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
    };

    axum::Router::new()
        .route("/ice", get(get_ice))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Serve the HTTP listener until the process exits.
pub async fn serve(addr: SocketAddr, app: axum::Router) -> CallwireResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CallwireError::Transport(format!("HTTP bind failed: {e}")))?;
    info!(addr = %addr, "HTTP listener started");
    axum::serve(listener, app)
        .await
        .map_err(|e| CallwireError::Transport(format!("HTTP serve failed: {e}")))
}

/// `GET /ice` — proxy the TURN/STUN credential request.
async fn get_ice(State(state): State<Arc<HttpState>>) -> Response {
    let Some(ice) = &state.ice else {
        return error_response("ice provider not configured");
    };
    match ice.fetch_ice_servers().await {
        Ok(servers) => (StatusCode::OK, Json(json!({ "iceServers": servers }))).into_response(),
        Err(e) => {
            error!(error = %e, "ice credential fetch failed");
            error_response(&e.to_string())
        }
    }
}

/// `GET /healthz` — relay counters, read-only.
async fn healthz(State(state): State<Arc<HttpState>>) -> Response {
    let stats = state.router.stats().await;
    Json(json!({
        "connections": stats.connections,
        "registered": stats.registered,
        "admins": stats.admins,
        "activeRetries": stats.active_retries,
    }))
    .into_response()
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
