use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wpg_common::Money;

use crate::db_types::{
    CommissionRecord,
    LedgerEntry,
    NewPurchase,
    PaymentRecord,
    PaymentType,
    RevenueSplit,
    Subscription,
};

/// What the caller expects an external transaction to do, supplied on the verification path where the business action
/// is known. Webhook-only sightings carry no expectation; for them, the payment record created at initiation time is
/// the expectation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedEffect {
    pub payment_type: PaymentType,
    pub account_id: i64,
    pub amount: Money,
    pub currency: String,
    /// Semester/session context for fee payments.
    pub period_tag: Option<String>,
    /// Purchase details when the transaction settles a marketplace purchase.
    pub purchase: Option<NewPurchase>,
    /// Subscription being renewed when the transaction funds a renewal.
    pub subscription_id: Option<i64>,
}

impl ExpectedEffect {
    pub fn funding(account_id: i64, amount: Money, currency: &str) -> Self {
        Self {
            payment_type: PaymentType::WalletFunding,
            account_id,
            amount,
            currency: currency.to_string(),
            period_tag: None,
            purchase: None,
            subscription_id: None,
        }
    }

    pub fn school_fees(account_id: i64, amount: Money, currency: &str, period_tag: Option<String>) -> Self {
        Self { payment_type: PaymentType::SchoolFees, period_tag, ..Self::funding(account_id, amount, currency) }
    }

    pub fn purchase(purchase: NewPurchase) -> Self {
        Self {
            payment_type: PaymentType::MarketplacePurchase,
            account_id: purchase.buyer_account_id,
            amount: purchase.gross_amount,
            currency: purchase.currency.clone(),
            period_tag: None,
            purchase: Some(purchase),
            subscription_id: None,
        }
    }
}

/// What a reconciliation actually did. Replays and late duplicates are normal operation, not errors, so they get an
/// outcome of their own instead of an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// The transaction was processed for the first time. The ledger entries listed here are the only ones written.
    Applied { record: PaymentRecord, entries: Vec<LedgerEntry>, new_balance: Money, split: Option<RevenueSplit> },
    /// The transaction had already reached a terminal state. Nothing was written.
    AlreadyProcessed { record: PaymentRecord },
    /// The transaction reference is unknown to us and carries no actionable effect. Nothing was written.
    Ignored { reference: String },
}

impl ReconcileOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }
}

/// Result of settling a purchase directly from a wallet balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub buyer_debit: LedgerEntry,
    /// Absent for platform-owned items, which never credit an owner.
    pub owner_credit: Option<LedgerEntry>,
    pub split: RevenueSplit,
    pub commission: CommissionRecord,
    pub buyer_balance: Money,
}

/// Result of a successful balance-funded subscription renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalResult {
    pub subscription: Subscription,
    pub member_debit: LedgerEntry,
    pub owner_credit: LedgerEntry,
    pub next_billing_date: DateTime<Utc>,
}

/// The derived balance of an account, as returned by balance materialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub account_id: i64,
    pub balance: Money,
    pub currency: String,
    /// True if this call performed the one-time legacy balance migration.
    pub migrated: bool,
}
