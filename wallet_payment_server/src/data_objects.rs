use std::fmt::Display;

use serde::{Deserialize, Serialize};
use wallet_payment_engine::db_types::{NewPurchase, PaymentRecord, PaymentType, TransactionStatus};
use wpg_common::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body for `POST /wallet/fund/initiate`. The reference is the client-generated idempotency key that the gateway
/// will echo back in webhooks and verification lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateFundingRequest {
    pub account_id: i64,
    pub amount: Money,
    pub currency: String,
    pub reference: String,
    #[serde(default = "default_payment_type")]
    pub payment_type: PaymentType,
    /// Semester/session context, required for school fee payments.
    #[serde(default)]
    pub period_tag: Option<String>,
}

fn default_payment_type() -> PaymentType {
    PaymentType::WalletFunding
}

/// Body for `POST /wallet/fund/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyFundingRequest {
    pub transaction_reference: String,
    #[serde(default)]
    pub gateway_transaction_id: Option<String>,
}

/// The business result of a funding verification or initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingResult {
    pub reference: String,
    pub status: TransactionStatus,
    pub payment_type: PaymentType,
    pub amount: Money,
    /// Present only when this call applied the transaction; replays report the recorded state without a balance.
    pub new_balance: Option<Money>,
    pub message: String,
}

impl FundingResult {
    pub fn applied(record: &PaymentRecord, new_balance: Money) -> Self {
        Self {
            reference: record.reference.clone(),
            status: record.status,
            payment_type: record.payment_type,
            amount: record.amount,
            new_balance: Some(new_balance),
            message: "Transaction applied.".to_string(),
        }
    }

    pub fn already_processed(record: &PaymentRecord) -> Self {
        Self {
            reference: record.reference.clone(),
            status: record.status,
            payment_type: record.payment_type,
            amount: record.amount,
            new_balance: None,
            message: "Transaction was already processed.".to_string(),
        }
    }
}

/// Body for `POST /purchase`: an internal, wallet-funded marketplace purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer_account_id: i64,
    /// Absent for platform-owned items.
    #[serde(default)]
    pub owner_account_id: Option<i64>,
    pub amount: Money,
    pub currency: String,
    pub item_description: String,
    pub reference: String,
}

impl From<PurchaseRequest> for NewPurchase {
    fn from(req: PurchaseRequest) -> Self {
        NewPurchase {
            buyer_account_id: req.buyer_account_id,
            owner_account_id: req.owner_account_id,
            gross_amount: req.amount,
            currency: req.currency,
            item_description: req.item_description,
            reference: req.reference,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertParams {
    /// Amount in minor units of the source currency. When absent, only the rate is returned.
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateResult {
    pub source_currency: String,
    pub destination_currency: String,
    pub rate: f64,
    pub used_fallback: bool,
    pub converted_amount: Option<Money>,
}
