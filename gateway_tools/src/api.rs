use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde_json::Value;

use crate::{
    config::GatewayConfig,
    data_objects::{RateQuote, TransactionDetails},
    GatewayError,
    RetryPolicy,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
    retry: RetryPolicy,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), retry: RetryPolicy::default() })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.config.has_credentials()
    }

    /// Look up a transaction by its client reference, retrying transient "not found" responses per the retry policy.
    ///
    /// The result is the canonical [`TransactionDetails`] shape; callers never see raw gateway fields.
    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionDetails, GatewayError> {
        let mut attempt = 1u32;
        loop {
            match self.lookup_once(reference).await {
                Ok(details) => return Ok(details),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    info!("🔎️ Gateway lookup for {reference} not found on attempt {attempt}, retrying. {e}");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                },
                Err(e) => {
                    debug!("🔎️ Gateway lookup for {reference} failed on attempt {attempt}. {e}");
                    return Err(e);
                },
            }
        }
    }

    async fn lookup_once(&self, reference: &str) -> Result<TransactionDetails, GatewayError> {
        let url = self.url("/transactions/verify_by_reference");
        trace!("🔎️ Verifying transaction {reference} via {url}");
        let response = self
            .client
            .get(url)
            .query(&[("tx_ref", reference)])
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
        match status {
            StatusCode::NOT_FOUND => Err(GatewayError::TransactionNotFound(reference.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(GatewayError::AuthenticationFailed(message_of(&body)))
            },
            StatusCode::BAD_REQUEST => Err(GatewayError::MalformedRequest(message_of(&body))),
            s if s.is_server_error() => Err(GatewayError::Unavailable(message_of(&body))),
            s if s.is_success() => {
                // The gateway also reports "not found" as a 200 with an error envelope.
                if body["status"].as_str() == Some("error") {
                    let msg = message_of(&body);
                    if msg.to_ascii_lowercase().contains("not found") {
                        return Err(GatewayError::TransactionNotFound(reference.to_string()));
                    }
                    return Err(GatewayError::UnexpectedResponse(msg));
                }
                TransactionDetails::from_value(&body["data"])
            },
            s => Err(GatewayError::UnexpectedResponse(format!("HTTP {s}: {}", message_of(&body)))),
        }
    }

    /// Fetch the current conversion rate between two currencies.
    pub async fn fetch_rate(&self, from: &str, to: &str) -> Result<RateQuote, GatewayError> {
        if !self.has_credentials() {
            return Err(GatewayError::AuthenticationFailed("No gateway credentials configured".to_string()));
        }
        let url = self.url("/rates");
        trace!("💱️ Fetching rate {from}->{to} via {url}");
        let response = self
            .client
            .get(url)
            .query(&[("from", from), ("to", to)])
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Unavailable(format!("HTTP {status}: {body}")));
        }
        let body = response.json::<Value>().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
        let rate = body["data"]["rate"]
            .as_f64()
            .ok_or_else(|| GatewayError::UnexpectedResponse("Rate response has no data.rate".to_string()))?;
        Ok(RateQuote { source_currency: from.to_string(), destination_currency: to.to_string(), rate })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

fn message_of(body: &Value) -> String {
    body["message"].as_str().map(str::to_string).unwrap_or_else(|| body.to_string())
}
