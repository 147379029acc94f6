use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wpg_common::Money;

use crate::db_types::{LedgerEntry, NoticeWindow, PaymentRecord, RevenueSplit, Subscription};

/// A wallet was credited by a reconciled gateway transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletFundedEvent {
    pub timestamp: DateTime<Utc>,
    pub account_id: i64,
    pub amount: Money,
    pub new_balance: Money,
    pub reference: String,
}

impl WalletFundedEvent {
    pub fn new(record: &PaymentRecord, new_balance: Money) -> Self {
        Self {
            timestamp: Utc::now(),
            account_id: record.account_id.unwrap_or_default(),
            amount: record.amount,
            new_balance,
            reference: record.reference.clone(),
        }
    }
}

/// A marketplace purchase settled, with its revenue split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCompletedEvent {
    pub timestamp: DateTime<Utc>,
    pub buyer_account_id: i64,
    pub reference: String,
    pub split: RevenueSplit,
}

/// A staged expiration notice fell due for a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalNoticeEvent {
    pub subscription: Subscription,
    pub window: NoticeWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRenewedEvent {
    pub subscription: Subscription,
    pub member_debit: LedgerEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionExpiredEvent {
    pub subscription: Subscription,
}
