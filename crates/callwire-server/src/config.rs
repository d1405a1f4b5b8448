//! Server configuration: TOML file + CLI overrides + env secrets.

use callwire_core::{CallwireError, CallwireResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Environment variables holding the ICE provider secrets, so they stay out
/// of config files in production.
pub const ICE_ACCOUNT_ENV: &str = "CALLWIRE_ICE_ACCOUNT";
pub const ICE_TOKEN_ENV: &str = "CALLWIRE_ICE_TOKEN";

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub cors: CorsSection,
    #[serde(default)]
    pub ice: IceSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// HTTP listener port; defaults to ws_port + 1.
    #[serde(default)]
    pub http_port: Option<u16>,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            ws_port: default_ws_port(),
            http_port: None,
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// `[cors]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSection {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// `[ice]` section of the config TOML. Credentials here are a development
/// convenience; the env vars win when set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IceSection {
    #[serde(default)]
    pub provider_url: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_ws_port() -> u16 {
    9030
}
fn default_retry_interval_ms() -> u64 {
    3000
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Credentials for the TURN/STUN provider behind `GET /ice`.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub provider_url: String,
    pub account_id: String,
    pub auth_token: String,
}

/// Resolved server configuration (CLI overrides and env applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub ws_port: u16,
    pub http_port: u16,
    pub retry_interval: Duration,
    pub allowed_origins: Vec<String>,
    /// `None` means the credential proxy is unconfigured and `/ice` fails.
    pub ice: Option<IceConfig>,
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides and env secrets.
    pub fn load(
        config_path: Option<&Path>,
        cli_port: Option<u16>,
        cli_http_port: Option<u16>,
        cli_retry_interval_ms: Option<u64>,
    ) -> CallwireResult<Self> {
        let file_config = match config_path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config file");
                let content = std::fs::read_to_string(path)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| CallwireError::Config(format!("config parse error: {e}")))?
            }
            Some(path) => {
                info!(path = %path.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            None => ConfigFile::default(),
        };

        Ok(Self::resolve(
            file_config,
            cli_port,
            cli_http_port,
            cli_retry_interval_ms,
            std::env::var(ICE_ACCOUNT_ENV).ok(),
            std::env::var(ICE_TOKEN_ENV).ok(),
        ))
    }

    /// Merge file values, CLI overrides, and env secrets.
    fn resolve(
        file: ConfigFile,
        cli_port: Option<u16>,
        cli_http_port: Option<u16>,
        cli_retry_interval_ms: Option<u64>,
        env_account: Option<String>,
        env_token: Option<String>,
    ) -> Self {
        let ws_port = cli_port.unwrap_or(file.server.ws_port);
        let http_port = cli_http_port
            .or(file.server.http_port)
            .unwrap_or(ws_port + 1);
        let retry_interval_ms =
            cli_retry_interval_ms.unwrap_or(file.server.retry_interval_ms);

        let account_id = env_account.or(file.ice.account_id);
        let auth_token = env_token.or(file.ice.auth_token);
        let ice = match (file.ice.provider_url, account_id, auth_token) {
            (Some(provider_url), Some(account_id), Some(auth_token)) => Some(IceConfig {
                provider_url,
                account_id,
                auth_token,
            }),
            _ => None,
        };

        Self {
            ws_port,
            http_port,
            retry_interval: Duration::from_millis(retry_interval_ms),
            allowed_origins: file.cors.allowed_origins,
            ice,
        }
    }
}
