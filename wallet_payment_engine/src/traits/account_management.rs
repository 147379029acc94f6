use thiserror::Error;

use crate::db_types::{LedgerEntry, PaymentRecord, Subscription, WalletAccount};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// Read-side queries over wallet accounts, their ledger entries and their payment history.
///
/// The [`crate::traits::WalletLedgerDatabase`] trait handles the machinery of writing the ledger;
/// `AccountManagement` only ever reads.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Fetches the wallet account with the given id. If no account exists, `None` is returned.
    async fn fetch_wallet_account(&self, account_id: i64) -> Result<Option<WalletAccount>, AccountApiError>;

    async fn fetch_wallet_account_for_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<WalletAccount>, AccountApiError>;

    /// Fetches ledger entries for the account, most recent first, up to `limit` rows.
    async fn fetch_ledger_entries(&self, account_id: i64, limit: i64) -> Result<Vec<LedgerEntry>, AccountApiError>;

    async fn fetch_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, AccountApiError>;

    async fn fetch_subscriptions_for_account(&self, account_id: i64) -> Result<Vec<Subscription>, AccountApiError>;
}
