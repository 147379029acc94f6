use thiserror::Error;

use crate::{
    db_types::{
        ExternalTransaction,
        NewPaymentRecord,
        NewPurchase,
        NoticeWindow,
        PaymentRecord,
        Subscription,
        WalletAccount,
    },
    traits::{
        data_objects::{BalanceSummary, ExpectedEffect, PurchaseResult, ReconcileOutcome, RenewalResult},
        AccountApiError,
        AccountManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the wallet payment engine.
///
/// This behaviour includes:
/// * Fetching and creating wallet accounts for customers.
/// * Reconciling external gateway transactions into exactly-once ledger effects.
/// * Materializing balances, including the one-time migration of legacy stored balances.
/// * Settling wallet-funded purchases and subscription renewals.
///
/// Every method that writes more than one row runs inside a single database transaction owned by the backend.
#[allow(async_fn_in_trait)]
pub trait WalletLedgerDatabase: Clone + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Fetches the wallet account for the given customer id, creating one (with a zero legacy balance) if none exists.
    async fn fetch_or_create_account(&self, customer_id: &str) -> Result<WalletAccount, WalletLedgerError>;

    /// Registers a payment attempt before the customer is sent to the gateway.
    ///
    /// Stores a `Pending` payment record carrying the expected amount, currency, payment type and target account, so
    /// that when the gateway later reports this reference (webhook or verify), the reconciliation can validate the
    /// event against what was actually requested. This call is idempotent: re-initiating an existing non-terminal
    /// reference returns the existing record; re-initiating a terminal one is an error.
    async fn initiate_payment(&self, new_record: NewPaymentRecord) -> Result<PaymentRecord, WalletLedgerError>;

    /// Takes a canonical external transaction and, in a single atomic transaction:
    /// * locates the payment record for the transaction's reference or gateway id, creating a `Processing` one from
    ///   `expected` when the verification path sees a reference before any initiation,
    /// * if the record is already terminal, makes **no** ledger writes and reports the recorded outcome,
    /// * if no record exists and no expectation was supplied (a webhook for a transaction we never initiated),
    ///   reports [`ReconcileOutcome::Ignored`] without effect,
    /// * otherwise validates status, amount and currency against the record,
    /// * appends the ledger effects for the payment type (funding credit, fee settlement pair, purchase split,
    ///   renewal), resynchronizes the cached balances of every touched account, and marks the record terminal.
    ///
    /// Webhook and verification paths both land here; the coordinator never needs to know which channel saw the
    /// transaction first.
    ///
    /// Successful replays and races are reported, not errored: the [`ReconcileOutcome`] says what actually happened.
    /// Validation failures mark the record `Failed` (that write is kept) and surface as errors, and replaying a
    /// `Failed` record re-reports that recorded failure as [`WalletLedgerError::AlreadyFailed`].
    async fn apply_reconciliation(
        &self,
        txn: &ExternalTransaction,
        expected: Option<&ExpectedEffect>,
    ) -> Result<ReconcileOutcome, WalletLedgerError>;

    /// Returns the authoritative balance for the account, derived from the ledger.
    ///
    /// If `auto_migrate` is set and the account still carries an unmigrated legacy stored balance exceeding the
    /// ledger sum, a one-time migration entry is appended first (inside the same transaction as the read) so that the
    /// ledger and the stored balance agree ever after. A legacy balance *below* the ledger sum only resynchronizes
    /// the cache; no entry is written.
    async fn balance_for_account(&self, account_id: i64, auto_migrate: bool)
        -> Result<BalanceSummary, WalletLedgerError>;

    /// Settles a purchase directly from the buyer's wallet balance, in a single atomic transaction:
    /// * verifies the derived balance covers the gross amount (else [`WalletLedgerError::InsufficientFunds`]),
    /// * debits the buyer for the gross amount,
    /// * credits the owner's account with the owner share (first-party items skip the owner credit entirely),
    /// * records the commission row for the platform share.
    async fn purchase_with_wallet(&self, purchase: &NewPurchase) -> Result<PurchaseResult, WalletLedgerError>;

    /// Fetches active, auto-renew subscriptions whose next billing date falls within the notice window and whose
    /// flag for that window has not been sent yet.
    async fn subscriptions_due_for_notice(&self, window: NoticeWindow) -> Result<Vec<Subscription>, WalletLedgerError>;

    /// Marks the notice flag for the given window as sent.
    async fn mark_notice_sent(&self, subscription_id: i64, window: NoticeWindow) -> Result<(), WalletLedgerError>;

    /// Fetches active subscriptions whose next billing date has passed.
    async fn subscriptions_past_due(&self) -> Result<Vec<Subscription>, WalletLedgerError>;

    /// Renews the subscription from the member's wallet balance, in a single atomic transaction:
    /// * debits the member and credits the community owner's account,
    /// * advances the next billing date by the subscription period,
    /// * resets the notice flags.
    ///
    /// Returns [`WalletLedgerError::InsufficientFunds`] without any writes if the balance does not cover the fee.
    async fn renew_subscription(&self, subscription: &Subscription) -> Result<RenewalResult, WalletLedgerError>;

    /// Expires the subscription: sets it `Expired` and decrements the community's member count. No money moves.
    async fn expire_subscription(&self, subscription: &Subscription) -> Result<Subscription, WalletLedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), WalletLedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum WalletLedgerError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The database is busy: {0}")]
    DatabaseBusy(String),
    #[error("The requested account id {0} does not exist")]
    AccountNotFound(i64),
    #[error("Cannot insert payment, since it already exists with reference {0}")]
    PaymentAlreadyExists(String),
    #[error("Cannot re-initiate payment {0}; it is already {1}")]
    PaymentAlreadyTerminal(String, String),
    #[error("Transaction {reference} is not successful at the gateway: {status}")]
    TransactionNotSuccessful { reference: String, status: String },
    #[error("Transaction {reference} amount mismatch: expected {expected}, gateway reported {actual}")]
    AmountMismatch { reference: String, expected: String, actual: String },
    #[error("Transaction {reference} currency mismatch: expected {expected}, gateway reported {actual}")]
    CurrencyMismatch { reference: String, expected: String, actual: String },
    #[error("Transaction {reference} was already recorded as failed: {reason}")]
    AlreadyFailed { reference: String, reason: String },
    #[error("Insufficient funds on account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds { account_id: i64, balance: String, required: String },
    #[error("The requested subscription id {0} does not exist")]
    SubscriptionNotFound(i64),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
}

impl WalletLedgerError {
    /// Busy/locked errors roll the failed unit back in full, so the caller may retry the whole flow.
    pub fn is_busy(&self) -> bool {
        matches!(self, WalletLedgerError::DatabaseBusy(_))
    }
}

impl From<sqlx::Error> for WalletLedgerError {
    fn from(e: sqlx::Error) -> Self {
        // SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes, including BUSY_SNAPSHOT (517).
        if let sqlx::Error::Database(db) = &e {
            if matches!(db.code().as_deref(), Some("5" | "6" | "261" | "262" | "517")) {
                return WalletLedgerError::DatabaseBusy(db.to_string());
            }
        }
        WalletLedgerError::DatabaseError(e.to_string())
    }
}
