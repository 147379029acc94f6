use gateway_tools::{GatewayApi, TransactionDetails, TransactionStatus as GatewayStatus};
use wallet_payment_engine::{
    db_types::{ExternalTransaction, TransactionStatus},
    traits::{ExchangeRateError, RateProvider},
    wpe_api::exchange_objects::ExchangeRate,
};

/// Convert the gateway client's normalized transaction into the engine's canonical shape. Both the webhook ingestor
/// and the verification path go through here, so the reconciliation coordinator sees one shape only.
pub fn canonical_transaction(details: TransactionDetails) -> ExternalTransaction {
    ExternalTransaction {
        reference: details.reference,
        gateway_id: details.gateway_id,
        amount: details.amount,
        currency: details.currency,
        status: canonical_status(details.status),
        raw_payload: details.raw,
    }
}

pub fn canonical_status(status: GatewayStatus) -> TransactionStatus {
    match status {
        GatewayStatus::Successful => TransactionStatus::Successful,
        GatewayStatus::Failed => TransactionStatus::Failed,
        GatewayStatus::Pending => TransactionStatus::Pending,
        GatewayStatus::Cancelled => TransactionStatus::Cancelled,
    }
}

/// Adapts the gateway REST client to the engine's [`RateProvider`] seam. The FX cache and fallback policy live in
/// the engine; this only fetches live quotes.
#[derive(Clone)]
pub struct GatewayRateProvider {
    api: GatewayApi,
}

impl GatewayRateProvider {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }
}

impl RateProvider for GatewayRateProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let quote =
            self.api.fetch_rate(from, to).await.map_err(|e| ExchangeRateError::SourceUnavailable(e.to_string()))?;
        Ok(ExchangeRate::new(&quote.source_currency, &quote.destination_currency, quote.rate))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use wpg_common::Money;

    use super::*;

    #[test]
    fn webhook_payloads_reach_the_engine_in_canonical_form() {
        let data = json!({
            "id": 99,
            "tx_ref": "TX-9",
            "amount": 5000.0,
            "currency": "NGN",
            "status": "successful"
        });
        let details = TransactionDetails::from_value(&data).unwrap();
        let txn = canonical_transaction(details);
        assert_eq!(txn.reference.as_deref(), Some("TX-9"));
        assert_eq!(txn.gateway_id.as_deref(), Some("99"));
        assert_eq!(txn.amount, Money::from(500_000));
        assert_eq!(txn.status, TransactionStatus::Successful);
    }

    #[test]
    fn every_gateway_status_maps_by_name() {
        assert_eq!(canonical_status(GatewayStatus::Successful), TransactionStatus::Successful);
        assert_eq!(canonical_status(GatewayStatus::Failed), TransactionStatus::Failed);
        assert_eq!(canonical_status(GatewayStatus::Pending), TransactionStatus::Pending);
        assert_eq!(canonical_status(GatewayStatus::Cancelled), TransactionStatus::Cancelled);
    }
}
