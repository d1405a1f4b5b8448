//! callwire-server: WebRTC call-signaling relay.
//!
//! Brokers session descriptions and ICE candidates between callers and
//! admins over WebSocket, and proxies TURN/STUN credential requests over
//! HTTP. Carries no media.

mod config;
mod http;
mod ice;
mod relay;
mod server;
mod transport;

use clap::Parser;
use config::ServerConfig;
use server::SignalServer;
use std::path::PathBuf;
use tracing::error;

/// callwire-server — call-signaling relay
#[derive(Parser, Debug)]
#[command(name = "callwire-server", version, about = "Call-signaling relay server")]
struct Cli {
    /// WebSocket listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP listen port (ICE proxy + health); defaults to port + 1
    #[arg(long)]
    http_port: Option<u16>,

    /// Config file path
    #[arg(long, default_value = "callwire.toml")]
    config: PathBuf,

    /// Broadcast retry interval in milliseconds
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = match ServerConfig::load(
        Some(cli.config.as_path()),
        cli.port,
        cli.http_port,
        cli.retry_interval_ms,
    ) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = SignalServer::new(config).run().await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
