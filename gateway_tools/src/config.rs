use std::time::Duration;

use log::*;
use wpg_common::Secret;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base url of the gateway REST API, e.g. "https://api.gateway.example/v3"
    pub base_url: String,
    /// The merchant secret key, sent as a bearer token on every call.
    pub secret_key: Secret<String>,
    /// Per-request timeout for gateway calls.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gateway.invalid/v3".to_string(),
            secret_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("WPG_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("WPG_GATEWAY_URL not set, using a non-routable default");
            Self::default().base_url
        });
        let secret_key = Secret::new(std::env::var("WPG_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("WPG_GATEWAY_SECRET_KEY not set. Gateway calls will fail and FX will use fallback rates.");
            String::default()
        }));
        let timeout = std::env::var("WPG_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { base_url, secret_key, timeout }
    }

    /// True when a merchant secret has been configured.
    pub fn has_credentials(&self) -> bool {
        !self.secret_key.reveal().is_empty()
    }
}
