use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wpg_common::Money;

use crate::GatewayError;

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Successful,
    Failed,
    Pending,
    Cancelled,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Successful => write!(f, "Successful"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "successful" | "success" | "completed" => Ok(Self::Successful),
            "failed" | "error" => Ok(Self::Failed),
            "pending" | "processing" => Ok(Self::Pending),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(GatewayError::UnexpectedResponse(format!("Unknown transaction status '{other}'"))),
        }
    }
}

//--------------------------------------  TransactionDetails  --------------------------------------------------------
/// The canonical, transport-independent form of a gateway transaction.
///
/// The gateway is not consistent about field names between its webhook payloads, its verification endpoint and its
/// API versions (`status` vs `payment_status`, `amount` vs `charged_amount`, `tx_ref` vs `reference` vs `txRef`).
/// [`TransactionDetails::from_value`] is the only place those aliases are resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetails {
    /// The client-supplied transaction reference (the primary idempotency key).
    pub reference: Option<String>,
    /// The gateway-assigned transaction id (the secondary idempotency key).
    pub gateway_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    /// The payload as received, kept for audit trails.
    pub raw: Value,
}

impl TransactionDetails {
    /// Normalize a gateway transaction object (webhook `data` or verification `data`) into canonical form.
    pub fn from_value(data: &Value) -> Result<Self, GatewayError> {
        let reference = first_string(data, &["tx_ref", "txRef", "reference"]);
        let gateway_id = first_string(data, &["id", "transaction_id"]);
        if reference.is_none() && gateway_id.is_none() {
            return Err(GatewayError::UnexpectedResponse(
                "Transaction payload carries neither a reference nor a gateway id".to_string(),
            ));
        }
        // A missing or unparseable status field means the payment did NOT succeed. It is never treated as pending.
        let status = first_string(data, &["status", "payment_status"])
            .and_then(|s| s.parse::<TransactionStatus>().ok())
            .unwrap_or(TransactionStatus::Failed);
        let amount = first_f64(data, &["charged_amount", "amount"])
            .map(Money::from_major_units_f64)
            .ok_or_else(|| GatewayError::UnexpectedResponse("Transaction payload has no amount".to_string()))?;
        let currency = first_string(data, &["currency"])
            .ok_or_else(|| GatewayError::UnexpectedResponse("Transaction payload has no currency".to_string()))?;
        Ok(Self { reference, gateway_id, amount, currency, status, raw: data.clone() })
    }
}

fn first_string(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match &data[*k] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_f64(data: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| data[*k].as_f64())
}

//--------------------------------------   WebhookEnvelope   ---------------------------------------------------------
/// The gateway's native webhook body: an event type plus the transaction object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: Value,
}

impl WebhookEnvelope {
    pub fn transaction(&self) -> Result<TransactionDetails, GatewayError> {
        TransactionDetails::from_value(&self.data)
    }

    /// Event types this system acts on. Anything else is acknowledged and dropped.
    pub fn is_charge_event(&self) -> bool {
        self.event.starts_with("charge.")
    }
}

//--------------------------------------      RateQuote      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub source_currency: String,
    pub destination_currency: String,
    pub rate: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verify_and_webhook_payloads_normalize_identically() {
        let webhook = serde_json::json!({
            "id": 1407347,
            "tx_ref": "TX-1",
            "amount": 5000.0,
            "currency": "NGN",
            "status": "successful"
        });
        let verify = serde_json::json!({
            "transaction_id": 1407347,
            "reference": "TX-1",
            "charged_amount": 5000.0,
            "currency": "NGN",
            "payment_status": "successful"
        });
        let a = TransactionDetails::from_value(&webhook).unwrap();
        let b = TransactionDetails::from_value(&verify).unwrap();
        assert_eq!(a.reference, b.reference);
        assert_eq!(a.gateway_id, b.gateway_id);
        assert_eq!(a.amount, b.amount);
        assert_eq!(a.currency, b.currency);
        assert_eq!(a.status, b.status);
        assert_eq!(a.amount, wpg_common::Money::from(500_000));
    }

    #[test]
    fn missing_status_is_failure_not_pending() {
        let data = serde_json::json!({"tx_ref": "TX-2", "amount": 10.0, "currency": "NGN"});
        let txn = TransactionDetails::from_value(&data).unwrap();
        assert_eq!(txn.status, TransactionStatus::Failed);
    }

    #[test]
    fn payload_without_any_id_is_rejected() {
        let data = serde_json::json!({"amount": 10.0, "currency": "NGN", "status": "successful"});
        assert!(TransactionDetails::from_value(&data).is_err());
    }

    #[test]
    fn charge_events_are_recognised() {
        let env = WebhookEnvelope { event: "charge.completed".to_string(), data: Value::Null };
        assert!(env.is_charge_event());
        let env = WebhookEnvelope { event: "transfer.completed".to_string(), data: Value::Null };
        assert!(!env.is_charge_event());
    }
}
