use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{LedgerEntry, NewPurchase, WalletAccount},
    events::{EventProducers, PurchaseCompletedEvent},
    traits::{AccountApiError, BalanceSummary, PurchaseResult, WalletLedgerDatabase, WalletLedgerError},
};

/// `WalletApi` provides wallet reads and wallet-funded spending.
///
/// Balance reads go through the materializer: the first read of an account with a legacy stored balance reconciles
/// that balance into the ledger exactly once, and every read thereafter returns the ledger-derived sum.
pub struct WalletApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> WalletApi<B>
where B: WalletLedgerDatabase
{
    pub async fn fetch_or_create_account(&self, customer_id: &str) -> Result<WalletAccount, WalletLedgerError> {
        self.db.fetch_or_create_account(customer_id).await
    }

    pub async fn account_by_customer_id(&self, customer_id: &str) -> Result<Option<WalletAccount>, AccountApiError> {
        self.db.fetch_wallet_account_for_customer_id(customer_id).await
    }

    /// The authoritative balance for the account, migrating any legacy stored balance on first read.
    pub async fn balance(&self, account_id: i64) -> Result<BalanceSummary, WalletLedgerError> {
        self.db.balance_for_account(account_id, true).await
    }

    /// The balance without triggering migration, for diagnostic reads.
    pub async fn balance_no_migration(&self, account_id: i64) -> Result<BalanceSummary, WalletLedgerError> {
        self.db.balance_for_account(account_id, false).await
    }

    pub async fn history(&self, account_id: i64, limit: i64) -> Result<Vec<LedgerEntry>, AccountApiError> {
        self.db.fetch_ledger_entries(account_id, limit).await
    }

    /// Settle a purchase from the buyer's existing wallet balance. No gateway event is involved; the debit, the
    /// owner's credit and the commission record are one atomic unit in the backend.
    pub async fn purchase(&self, purchase: NewPurchase) -> Result<PurchaseResult, WalletLedgerError> {
        let result = self.db.purchase_with_wallet(&purchase).await?;
        debug!(
            "🛒️ Purchase {} settled from wallet. Buyer balance is now {}",
            purchase.reference, result.buyer_balance
        );
        for emitter in &self.producers.purchase_completed_producer {
            let event = PurchaseCompletedEvent {
                timestamp: chrono::Utc::now(),
                buyer_account_id: purchase.buyer_account_id,
                reference: purchase.reference.clone(),
                split: result.split,
            };
            emitter.publish_event(event).await;
        }
        Ok(result)
    }
}
