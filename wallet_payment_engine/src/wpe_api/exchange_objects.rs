use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wpg_common::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub source_currency: String,
    pub destination_currency: String,
    /// Units of the destination currency per one unit of the source currency.
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
    /// True when the rate came from the static fallback table rather than the live provider.
    pub is_fallback: bool,
}

impl ExchangeRate {
    pub fn new(from: &str, to: &str, rate: f64) -> Self {
        Self {
            source_currency: from.to_string(),
            destination_currency: to.to_string(),
            rate,
            fetched_at: Utc::now(),
            is_fallback: false,
        }
    }

    pub fn fallback(from: &str, to: &str, rate: f64) -> Self {
        Self { is_fallback: true, ..Self::new(from, to, rate) }
    }

    /// The identity rate for same-currency conversions.
    pub fn identity(currency: &str) -> Self {
        Self::new(currency, currency, 1.0)
    }

    /// Convert an amount of the source currency. Rounding to a whole minor unit happens here, once.
    pub fn convert(&self, amount: Money) -> Money {
        #[allow(clippy::cast_precision_loss)]
        Money::from_minor_units_f64(amount.value() as f64 * self.rate)
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 {} => {} {}", self.source_currency, self.rate, self.destination_currency)
    }
}

/// The outcome of a currency conversion, including where the rate came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub converted_amount: Money,
    pub rate: f64,
    pub used_fallback: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversion_rounds_once_half_away_from_zero() {
        let rate = ExchangeRate::new("USD", "NGN", 1500.0);
        assert_eq!(rate.convert(Money::from(100)), Money::from(150_000));
        // 0.03 USD at 1499.505 = 44.98515 NGN minor units... 3 * 1499.505 = 4498.515 -> 4499
        let rate = ExchangeRate::new("USD", "NGN", 1499.505);
        assert_eq!(rate.convert(Money::from(3)), Money::from(4499));
    }

    #[test]
    fn identity_rate_is_one() {
        let rate = ExchangeRate::identity("NGN");
        assert_eq!(rate.convert(Money::from(12_345)), Money::from(12_345));
        assert!(!rate.is_fallback);
    }
}
