use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use log::*;
use wpg_common::Money;

use crate::{
    traits::{ExchangeRateError, RateProvider},
    wpe_api::exchange_objects::{ConversionResult, ExchangeRate},
};

/// How long a live provider quote stays usable.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Static rates used when the provider is unavailable or unconfigured. Symmetric: if `A->B` is listed, `B->A` is its
/// reciprocal.
const FALLBACK_RATES: [(&str, &str, f64); 3] = [("USD", "NGN", 1500.0), ("EUR", "NGN", 1650.0), ("GBP", "NGN", 1900.0)];

/// `FxApi` converts amounts between currencies.
///
/// Live rates come from the configured [`RateProvider`] and are cached per currency pair for a short TTL. When the
/// provider fails, a static fallback table answers instead; fallback rates are never cached, so a provider recovery
/// is picked up on the next call. Same-currency conversions short-circuit without touching cache or provider.
pub struct FxApi<P> {
    provider: P,
    cache: Arc<Mutex<HashMap<(String, String), ExchangeRate>>>,
    ttl: Duration,
}

impl<P> FxApi<P> {
    pub fn new(provider: P) -> Self {
        Self { provider, cache: Arc::new(Mutex::new(HashMap::new())), ttl: CACHE_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cached_rate(&self, from: &str, to: &str) -> Option<ExchangeRate> {
        let cache = self.cache.lock().ok()?;
        let rate = cache.get(&(from.to_string(), to.to_string()))?;
        let age = (Utc::now() - rate.fetched_at).num_seconds();
        if age >= 0 && (age as u64) < self.ttl.as_secs() {
            Some(rate.clone())
        } else {
            None
        }
    }

    fn cache_rate(&self, rate: &ExchangeRate) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert((rate.source_currency.clone(), rate.destination_currency.clone()), rate.clone());
        }
    }

    fn fallback_rate(from: &str, to: &str) -> Option<ExchangeRate> {
        for (a, b, rate) in FALLBACK_RATES {
            if a.eq_ignore_ascii_case(from) && b.eq_ignore_ascii_case(to) {
                return Some(ExchangeRate::fallback(from, to, rate));
            }
            if b.eq_ignore_ascii_case(from) && a.eq_ignore_ascii_case(to) {
                return Some(ExchangeRate::fallback(from, to, 1.0 / rate));
            }
        }
        None
    }
}

impl<P> FxApi<P>
where P: RateProvider
{
    /// Fetch the rate for the pair, consulting the cache, the provider and the fallback table in that order.
    pub async fn rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(ExchangeRate::identity(from));
        }
        if let Some(rate) = self.cached_rate(from, to) {
            trace!("💱️ Using cached rate for {from}->{to}: {rate}");
            return Ok(rate);
        }
        match self.provider.fetch_rate(from, to).await {
            Ok(rate) => {
                self.cache_rate(&rate);
                Ok(rate)
            },
            Err(e) => {
                warn!("💱️ Rate provider failed for {from}->{to} ({e}). Trying the fallback table.");
                Self::fallback_rate(from, to)
                    .ok_or_else(|| ExchangeRateError::RateDoesNotExist(format!("{from}->{to}")))
            },
        }
    }

    /// Convert an amount between currencies. The result is rounded to a whole minor unit once, at the end.
    pub async fn convert(&self, amount: Money, from: &str, to: &str) -> Result<ConversionResult, ExchangeRateError> {
        let rate = self.rate(from, to).await?;
        Ok(ConversionResult { converted_amount: rate.convert(amount), rate: rate.rate, used_fallback: rate.is_fallback })
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct CannedProvider {
        rate: Option<f64>,
        calls: AtomicU32,
    }

    impl CannedProvider {
        fn with_rate(rate: f64) -> Self {
            Self { rate: Some(rate), calls: AtomicU32::new(0) }
        }

        fn failing() -> Self {
            Self { rate: None, calls: AtomicU32::new(0) }
        }
    }

    impl RateProvider for &CannedProvider {
        async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.rate {
                Some(rate) => Ok(ExchangeRate::new(from, to, rate)),
                None => Err(ExchangeRateError::SourceUnavailable("canned outage".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn same_currency_is_the_identity_even_when_the_provider_is_down() {
        let provider = CannedProvider::failing();
        let fx = FxApi::new(&provider);
        let result = fx.convert(Money::from(123_456), "NGN", "NGN").await.unwrap();
        assert_eq!(result.converted_amount, Money::from(123_456));
        assert!(!result.used_fallback);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_rates_are_cached_for_the_ttl() {
        let provider = CannedProvider::with_rate(1480.0);
        let fx = FxApi::new(&provider);
        let first = fx.convert(Money::from(100), "USD", "NGN").await.unwrap();
        let second = fx.convert(Money::from(100), "USD", "NGN").await.unwrap();
        assert_eq!(first.converted_amount, Money::from(148_000));
        assert_eq!(second.converted_amount, Money::from(148_000));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fallback_is_symmetric_and_never_cached() {
        let provider = CannedProvider::failing();
        let fx = FxApi::new(&provider);
        let forward = fx.rate("USD", "NGN").await.unwrap();
        assert!(forward.is_fallback);
        assert_eq!(forward.rate, 1500.0);
        let reverse = fx.rate("NGN", "USD").await.unwrap();
        assert!(reverse.is_fallback);
        assert!((reverse.rate - 1.0 / 1500.0).abs() < 1e-12);
        // Every call hits the provider again because fallback responses are not cached.
        fx.rate("USD", "NGN").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_pairs_with_no_fallback_are_an_error() {
        let provider = CannedProvider::failing();
        let fx = FxApi::new(&provider);
        let err = fx.rate("USD", "JPY").await.unwrap_err();
        assert!(matches!(err, ExchangeRateError::RateDoesNotExist(_)));
    }
}
