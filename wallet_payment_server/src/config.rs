use std::{env, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use wpg_common::Secret;

const DEFAULT_WPG_HOST: &str = "127.0.0.1";
const DEFAULT_WPG_PORT: u16 = 8480;
const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the gateway's `verif-hash` webhook signature. When empty, webhooks are accepted without
    /// signature verification (degraded, non-production mode) and every acceptance is logged loudly.
    pub webhook_secret: Secret<String>,
    /// Configuration for the outbound gateway client (transaction verification, FX quotes).
    pub gateway: GatewayConfig,
    /// How often the subscription renewal worker sweeps for notices and past-due subscriptions.
    pub renewal_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WPG_HOST.to_string(),
            port: DEFAULT_WPG_PORT,
            database_url: String::default(),
            webhook_secret: Secret::default(),
            gateway: GatewayConfig::default(),
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WPG_HOST").ok().unwrap_or_else(|| DEFAULT_WPG_HOST.into());
        let port = env::var("WPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for WPG_PORT. {e} Using the default, {DEFAULT_WPG_PORT}, instead."
                    );
                    DEFAULT_WPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_WPG_PORT);
        let database_url = env::var("WPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ WPG_DATABASE_URL is not set. Please set it to the URL for the wallet database.");
            String::default()
        });
        let webhook_secret = Secret::new(env::var("WPG_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!(
                "🪛️ WPG_WEBHOOK_SECRET is not set. Incoming webhooks will be accepted WITHOUT signature \
                 verification. Do not run production like this."
            );
            String::default()
        }));
        let renewal_interval = env::var("WPG_RENEWAL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RENEWAL_INTERVAL);
        let gateway = GatewayConfig::new_from_env_or_default();
        Self { host, port, database_url, webhook_secret, gateway, renewal_interval }
    }
}
