//! Client for the third-party TURN/STUN credential provider.
//!
//! `GET /ice` proxies through this: one authenticated request to the
//! provider's token endpoint, extract the ICE server list from the response,
//! hand it back as-is. Provider failures surface as errors for the HTTP
//! layer to turn into a 500; they never affect the relay.

use crate::config::IceConfig;
use callwire_core::{CallwireError, CallwireResult};
use serde_json::Value;

pub struct IceClient {
    http: reqwest::Client,
    config: IceConfig,
}

impl IceClient {
    pub fn new(config: IceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Request fresh ICE server credentials from the provider.
    pub async fn fetch_ice_servers(&self) -> CallwireResult<Value> {
        let resp = self
            .http
            .post(&self.config.provider_url)
            .basic_auth(&self.config.account_id, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(|e| CallwireError::IceProvider(format!("provider request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CallwireError::IceProvider(format!(
                "provider returned {status}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CallwireError::IceProvider(format!("unparsable provider response: {e}")))?;

        extract_ice_servers(&body).ok_or_else(|| {
            CallwireError::IceProvider("no ice server list in provider response".to_string())
        })
    }
}

/// Providers disagree on the field name: Twilio-style APIs use
/// `ice_servers`, browser-facing ones `iceServers`.
fn extract_ice_servers(body: &Value) -> Option<Value> {
    body.get("iceServers")
        .or_else(|| body.get("ice_servers"))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_camel_case_field() {
        let body = json!({"iceServers": [{"urls": "stun:stun.example.com"}]});
        assert_eq!(
            extract_ice_servers(&body),
            Some(json!([{"urls": "stun:stun.example.com"}]))
        );
    }

    #[test]
    fn extracts_snake_case_field() {
        let body = json!({"ice_servers": [], "ttl": 86400});
        assert_eq!(extract_ice_servers(&body), Some(json!([])));
    }

    #[test]
    fn missing_field_is_none() {
        assert_eq!(extract_ice_servers(&json!({"servers": []})), None);
    }
}
