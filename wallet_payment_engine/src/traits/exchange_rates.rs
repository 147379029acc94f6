use thiserror::Error;

use crate::wpe_api::exchange_objects::ExchangeRate;

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("The rate source is unavailable: {0}")]
    SourceUnavailable(String),
    #[error("The requested exchange rate does not exist: {0}")]
    RateDoesNotExist(String),
}

/// The seam between FX policy (caching, fallback) and wherever live rates actually come from.
///
/// The server crate adapts its gateway client to this trait; tests substitute a canned provider.
#[allow(async_fn_in_trait)]
pub trait RateProvider {
    /// Fetch the current exchange rate for the given currency pair. If the source cannot supply the pair, the error
    /// [`ExchangeRateError::RateDoesNotExist`] is returned.
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError>;
}
