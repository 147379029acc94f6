//! `SqliteDatabase` is a concrete implementation of a wallet payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every multi-step flow runs inside a single `BEGIN IMMEDIATE` transaction: taking the write lock up front
//! means the flow's reads always see the latest committed state, instead of a deferred snapshot that aborts with
//! `SQLITE_BUSY_SNAPSHOT` on the first write. The per-reference idempotency race is decided by the unique constraint
//! on `payment_records.reference` and the status guard on the terminal update.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection, SqlitePool};
use wpg_common::{Money, MONEY_EPSILON};

use super::db::{accounts, commissions, db_url, ledger, new_pool, payment_records, subscriptions};
use crate::{
    db_types::{
        ExternalTransaction,
        LedgerEntry,
        NewLedgerEntry,
        NewPaymentRecord,
        NewPurchase,
        NoticeWindow,
        PaymentRecord,
        PaymentType,
        RevenueSplit,
        Subscription,
        SubscriptionStatus,
        TransactionStatus,
        WalletAccount,
        MIGRATION_SERVICE_NAME,
    },
    traits::{
        AccountApiError,
        AccountManagement,
        BalanceSummary,
        ExpectedEffect,
        PurchaseResult,
        ReconcileOutcome,
        RenewalResult,
        WalletLedgerDatabase,
        WalletLedgerError,
    },
};

const FUNDING_SERVICE_NAME: &str = "Wallet Funding";
const SCHOOL_FEES_SERVICE_NAME: &str = "School Fees";
const RENEWAL_SERVICE_NAME: &str = "Subscription Renewal";

const MAX_BUSY_ATTEMPTS: u32 = 3;

/// What one reconciliation attempt decided should happen to its open transaction.
enum ReconcileAttempt {
    /// Effects applied (or nothing to do); commit and report.
    Complete(ReconcileOutcome),
    /// Validation rejected the transaction; the `Failed` mark must be committed, then the error surfaced.
    Rejected(WalletLedgerError),
    /// Another caller reached the terminal state first; roll back and report their committed record.
    LostRace(String),
}

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the database URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, WalletLedgerError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, WalletLedgerError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction that takes the write lock immediately.
    ///
    /// A deferred transaction under WAL can pin a stale read snapshot and then abort with code 517 on its first
    /// write; starting IMMEDIATE serializes the writers and guarantees every read in a read-modify-write flow sees
    /// the latest committed state.
    async fn begin_write(&self) -> Result<PoolConnection<Sqlite>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    async fn commit(mut conn: PoolConnection<Sqlite>) -> Result<(), WalletLedgerError> {
        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// The connection must never return to the pool with the transaction still open.
    async fn rollback(mut conn: PoolConnection<Sqlite>) {
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!("🗃️ Rollback failed: {e}");
        }
    }

    /// Appends the ledger effects for a validated transaction and resyncs every touched cache. Runs inside the
    /// caller's transaction.
    async fn apply_effects(
        &self,
        record: &PaymentRecord,
        expected: Option<&ExpectedEffect>,
        conn: &mut SqliteConnection,
    ) -> Result<(Vec<LedgerEntry>, Money, Option<RevenueSplit>), WalletLedgerError> {
        let account_id = record
            .account_id
            .or(expected.map(|e| e.account_id))
            .ok_or_else(|| WalletLedgerError::DatabaseError(format!("Record {} has no account", record.reference)))?;
        let account = accounts::account_by_id(account_id, conn)
            .await?
            .ok_or(WalletLedgerError::AccountNotFound(account_id))?;
        let mut entries = Vec::with_capacity(4);
        let mut split = None;
        let credit =
            NewLedgerEntry::credit(account.id, record.amount, &record.currency, FUNDING_SERVICE_NAME)
                .with_external_ref(record.reference.clone());
        entries.push(ledger::insert_entry(credit, conn).await?);
        match record.payment_type {
            PaymentType::WalletFunding => {},
            PaymentType::SchoolFees => {
                let period_tag =
                    record.period_tag.clone().or_else(|| expected.and_then(|e| e.period_tag.clone()));
                let mut debit =
                    NewLedgerEntry::debit(account.id, record.amount, &record.currency, SCHOOL_FEES_SERVICE_NAME)
                        .with_external_ref(record.reference.clone());
                debit.period_tag = period_tag;
                entries.push(ledger::insert_entry(debit, conn).await?);
            },
            PaymentType::MarketplacePurchase => {
                let purchase = record
                    .purchase()
                    .or_else(|| expected.and_then(|e| e.purchase.clone()))
                    .ok_or_else(|| {
                        WalletLedgerError::DatabaseError(format!(
                            "Purchase record {} has no purchase details",
                            record.reference
                        ))
                    })?;
                let (purchase_entries, purchase_split) = self.distribute_revenue(&purchase, conn).await?;
                entries.extend(purchase_entries);
                split = Some(purchase_split);
            },
            PaymentType::SubscriptionRenewal => {
                let sub_id = record.subscription_id.or(expected.and_then(|e| e.subscription_id));
                if let Some(sub_id) = sub_id {
                    let sub = subscriptions::subscription_by_id(sub_id, conn)
                        .await?
                        .ok_or(WalletLedgerError::SubscriptionNotFound(sub_id))?;
                    let renewal = self.renew_in_tx(&sub, conn).await?;
                    entries.push(renewal.member_debit);
                    entries.push(renewal.owner_credit);
                }
            },
        }
        let new_balance = self.resync_balance(account.id, conn).await?;
        // Resync any other account the effects touched.
        for entry in &entries {
            if entry.account_id != account.id {
                self.resync_balance(entry.account_id, conn).await?;
            }
        }
        Ok((entries, new_balance, split))
    }

    /// Debits the buyer for the gross amount, credits the owner's share and records the platform's commission.
    /// The platform share lives in the commission record only; no platform ledger credit is written.
    async fn distribute_revenue(
        &self,
        purchase: &NewPurchase,
        conn: &mut SqliteConnection,
    ) -> Result<(Vec<LedgerEntry>, RevenueSplit), WalletLedgerError> {
        let mut entries = Vec::with_capacity(2);
        let debit = NewLedgerEntry::debit(
            purchase.buyer_account_id,
            purchase.gross_amount,
            &purchase.currency,
            &purchase.item_description,
        )
        .with_external_ref(purchase.reference.clone());
        entries.push(ledger::insert_entry(debit, conn).await?);
        let owner = match purchase.owner_account_id {
            Some(id) => accounts::account_by_id(id, conn).await?.ok_or(WalletLedgerError::AccountNotFound(id)),
            None => accounts::platform_account(conn).await.map_err(WalletLedgerError::from),
        }?;
        let split = if owner.is_platform {
            RevenueSplit::platform_owned(purchase.gross_amount)
        } else {
            RevenueSplit::calculate(purchase.gross_amount, owner.effective_commission_rate())
        };
        if !owner.is_platform && split.owner_share.is_positive() {
            let credit =
                NewLedgerEntry::credit(owner.id, split.owner_share, &purchase.currency, &purchase.item_description)
                    .with_external_ref(purchase.reference.clone());
            entries.push(ledger::insert_entry(credit, conn).await?);
        }
        let owner_id = (!owner.is_platform).then_some(owner.id);
        commissions::insert(&purchase.reference, owner_id, &split, &purchase.currency, conn).await?;
        debug!(
            "🪙️ Purchase {} split: {} to platform, {} to owner (rate {}%)",
            purchase.reference, split.platform_share, split.owner_share, split.commission_rate
        );
        Ok((entries, split))
    }

    /// Debits the member, credits the community owner and advances the billing date. Runs inside the caller's
    /// transaction; the caller has already checked the balance covers the fee.
    async fn renew_in_tx(
        &self,
        sub: &Subscription,
        conn: &mut SqliteConnection,
    ) -> Result<RenewalResult, WalletLedgerError> {
        let owner_id = subscriptions::community_owner(&sub.community_id, conn).await?.ok_or_else(|| {
            WalletLedgerError::DatabaseError(format!("Community {} has no owner account", sub.community_id))
        })?;
        let external_ref = format!("SUB-{}-{}", sub.id, Utc::now().timestamp());
        let debit = NewLedgerEntry::debit(sub.account_id, sub.amount, &sub.currency, RENEWAL_SERVICE_NAME)
            .with_external_ref(external_ref.clone())
            .with_period_tag(sub.community_id.clone());
        let member_debit = ledger::insert_entry(debit, conn).await?;
        let credit = NewLedgerEntry::credit(owner_id, sub.amount, &sub.currency, RENEWAL_SERVICE_NAME)
            .with_external_ref(external_ref)
            .with_period_tag(sub.community_id.clone());
        let owner_credit = ledger::insert_entry(credit, conn).await?;
        let next_billing_date = sub.next_billing_date + Duration::days(sub.period_days);
        let subscription = subscriptions::advance_billing_date(sub.id, next_billing_date, conn).await?;
        Ok(RenewalResult { subscription, member_debit, owner_credit, next_billing_date })
    }

    async fn resync_balance(&self, account_id: i64, conn: &mut SqliteConnection) -> Result<Money, WalletLedgerError> {
        let balance = ledger::ledger_balance(account_id, conn).await?;
        accounts::set_cached_balance(account_id, balance, conn).await?;
        Ok(balance)
    }

    /// Materializes the account balance inside the caller's transaction: runs the one-time legacy migration (when
    /// requested), resyncs the cache and returns a summary the caller can trust for sufficiency checks.
    async fn materialize_in_tx(
        &self,
        account_id: i64,
        auto_migrate: bool,
        conn: &mut SqliteConnection,
    ) -> Result<BalanceSummary, WalletLedgerError> {
        let account = accounts::account_by_id(account_id, conn)
            .await?
            .ok_or(WalletLedgerError::AccountNotFound(account_id))?;
        let ledger_balance = ledger::ledger_balance(account_id, conn).await?;
        let mut balance = ledger_balance;
        let mut migrated = false;
        if !account.legacy_migrated {
            // The legacy stored balance is only touched when migration is requested; diagnostic reads leave it as-is.
            if auto_migrate {
                let drift = account.cached_balance - ledger_balance;
                if drift > MONEY_EPSILON && !ledger::has_migration_entry(account_id, conn).await? {
                    let external_ref = format!("MIGRATION-{account_id}-{}", Utc::now().timestamp());
                    let entry = NewLedgerEntry::credit(account_id, drift, &account.currency, MIGRATION_SERVICE_NAME)
                        .with_external_ref(external_ref);
                    ledger::insert_entry(entry, conn).await?;
                    balance = account.cached_balance;
                    migrated = true;
                    info!("🗃️ Account {account_id}: migrated legacy balance of {drift} into the ledger");
                }
                // A legacy balance at or below the ledger sum only resyncs the cache downward; no entry is written.
                accounts::mark_migrated(account_id, balance, conn).await?;
            }
        } else if account.cached_balance != ledger_balance {
            accounts::set_cached_balance(account_id, ledger_balance, conn).await?;
        }
        Ok(BalanceSummary { account_id, balance, currency: account.currency, migrated })
    }

    /// The replay path: another caller finished this reference first, so report its committed record. A record that
    /// finished `Failed` reports the recorded failure instead; the state machine is one-way.
    async fn read_existing_record(&self, reference: &str) -> Result<ReconcileOutcome, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        match payment_records::fetch_by_reference(reference, &mut conn).await? {
            Some(record) if record.status == TransactionStatus::Failed => Err(recorded_failure(&record)),
            Some(record) => Ok(ReconcileOutcome::AlreadyProcessed { record }),
            None => Err(WalletLedgerError::DatabaseError(format!("Payment record {reference} vanished mid-race"))),
        }
    }

    async fn try_apply_reconciliation(
        &self,
        txn: &ExternalTransaction,
        expected: Option<&ExpectedEffect>,
    ) -> Result<ReconcileOutcome, WalletLedgerError> {
        let mut conn = self.begin_write().await?;
        match self.reconcile_in_tx(txn, expected, &mut conn).await {
            Ok(ReconcileAttempt::Complete(outcome)) => {
                Self::commit(conn).await?;
                Ok(outcome)
            },
            // The Failed mark is the one write that must survive a rejected transaction.
            Ok(ReconcileAttempt::Rejected(e)) => {
                Self::commit(conn).await?;
                Err(e)
            },
            Ok(ReconcileAttempt::LostRace(reference)) => {
                Self::rollback(conn).await;
                self.read_existing_record(&reference).await
            },
            Err(e) => {
                Self::rollback(conn).await;
                Err(e)
            },
        }
    }

    async fn reconcile_in_tx(
        &self,
        txn: &ExternalTransaction,
        expected: Option<&ExpectedEffect>,
        conn: &mut SqliteConnection,
    ) -> Result<ReconcileAttempt, WalletLedgerError> {
        // Both keys are checked: a webhook may carry only the gateway id while the verify path used the reference.
        let mut existing = match txn.reference.as_deref() {
            Some(reference) => payment_records::fetch_by_reference(reference, conn).await?,
            None => None,
        };
        if existing.is_none() {
            if let Some(gateway_id) = txn.gateway_id.as_deref() {
                existing = payment_records::fetch_by_gateway_id(gateway_id, conn).await?;
            }
        }
        let record = match existing {
            Some(record) if record.status == TransactionStatus::Failed => {
                debug!("🔁️ Transaction {} replayed; its recorded failure stands", record.reference);
                return Ok(ReconcileAttempt::Rejected(recorded_failure(&record)));
            },
            Some(record) if record.status.is_terminal() => {
                debug!("🔁️ Transaction {} replayed; it is already {}", record.reference, record.status);
                return Ok(ReconcileAttempt::Complete(ReconcileOutcome::AlreadyProcessed { record }));
            },
            Some(record) => record,
            None => {
                let (Some(reference), Some(exp)) = (txn.reference.as_deref(), expected) else {
                    info!("🤷️ Transaction {} matches no payment record; acknowledging without effect", txn.key());
                    return Ok(ReconcileAttempt::Complete(ReconcileOutcome::Ignored {
                        reference: txn.key().to_string(),
                    }));
                };
                let mut new_record =
                    NewPaymentRecord::new(reference, exp.amount, &exp.currency, exp.payment_type, exp.account_id);
                new_record.period_tag = exp.period_tag.clone();
                new_record.subscription_id = exp.subscription_id;
                new_record.purchase = exp.purchase.clone();
                payment_records::idempotent_insert(new_record, TransactionStatus::Processing, conn).await?
            },
        };
        let reference = record.reference.clone();
        payment_records::record_verification_attempt(&reference, conn).await?;
        if let Err(e) = validate(&record, txn) {
            warn!("🚫️ Transaction {reference} failed validation: {e}");
            let updated = payment_records::set_terminal(
                &reference,
                TransactionStatus::Failed,
                txn.gateway_id.as_deref(),
                Some(&e.to_string()),
                conn,
            )
            .await?;
            if updated.is_none() {
                return Ok(ReconcileAttempt::LostRace(reference));
            }
            return Ok(ReconcileAttempt::Rejected(e));
        }
        let (entries, new_balance, split) = self.apply_effects(&record, expected, conn).await?;
        let record = match payment_records::set_terminal(
            &reference,
            TransactionStatus::Successful,
            txn.gateway_id.as_deref(),
            None,
            conn,
        )
        .await?
        {
            Some(record) => record,
            None => return Ok(ReconcileAttempt::LostRace(reference)),
        };
        info!("🪙️ Transaction {reference} reconciled. {} ledger entries, new balance {new_balance}", entries.len());
        Ok(ReconcileAttempt::Complete(ReconcileOutcome::Applied { record, entries, new_balance, split }))
    }

    async fn try_balance_for_account(
        &self,
        account_id: i64,
        auto_migrate: bool,
    ) -> Result<BalanceSummary, WalletLedgerError> {
        let mut conn = self.begin_write().await?;
        match self.materialize_in_tx(account_id, auto_migrate, &mut conn).await {
            Ok(summary) => {
                Self::commit(conn).await?;
                Ok(summary)
            },
            Err(e) => {
                Self::rollback(conn).await;
                Err(e)
            },
        }
    }

    async fn try_purchase_with_wallet(&self, purchase: &NewPurchase) -> Result<PurchaseResult, WalletLedgerError> {
        let mut conn = self.begin_write().await?;
        match self.purchase_in_tx(purchase, &mut conn).await {
            Ok(result) => {
                Self::commit(conn).await?;
                Ok(result)
            },
            Err(e) => {
                Self::rollback(conn).await;
                Err(e)
            },
        }
    }

    async fn purchase_in_tx(
        &self,
        purchase: &NewPurchase,
        conn: &mut SqliteConnection,
    ) -> Result<PurchaseResult, WalletLedgerError> {
        // The sufficiency check runs against the materialized balance, so unmigrated legacy funds count.
        let balance = self.materialize_in_tx(purchase.buyer_account_id, true, conn).await?.balance;
        if balance < purchase.gross_amount {
            return Err(WalletLedgerError::InsufficientFunds {
                account_id: purchase.buyer_account_id,
                balance: balance.to_string(),
                required: purchase.gross_amount.to_string(),
            });
        }
        let (entries, split) = self.distribute_revenue(purchase, conn).await?;
        let commission = commissions::fetch_for_purchase(&purchase.reference, conn).await?.ok_or_else(|| {
            WalletLedgerError::DatabaseError(format!("Commission record for {} vanished", purchase.reference))
        })?;
        let buyer_balance = self.resync_balance(purchase.buyer_account_id, conn).await?;
        let mut owner_credit = None;
        for entry in entries.iter().skip(1) {
            self.resync_balance(entry.account_id, conn).await?;
            owner_credit = Some(entry.clone());
        }
        let buyer_debit = entries.into_iter().next().ok_or_else(|| {
            WalletLedgerError::DatabaseError(format!("Purchase {} produced no ledger entries", purchase.reference))
        })?;
        Ok(PurchaseResult { buyer_debit, owner_credit, split, commission, buyer_balance })
    }

    async fn try_renew_subscription(&self, subscription: &Subscription) -> Result<RenewalResult, WalletLedgerError> {
        let mut conn = self.begin_write().await?;
        match self.renew_from_balance_in_tx(subscription, &mut conn).await {
            Ok(result) => {
                Self::commit(conn).await?;
                info!(
                    "🗓️ Subscription {} renewed from balance; next billing {}",
                    subscription.id, result.next_billing_date
                );
                Ok(result)
            },
            Err(e) => {
                Self::rollback(conn).await;
                Err(e)
            },
        }
    }

    async fn renew_from_balance_in_tx(
        &self,
        subscription: &Subscription,
        conn: &mut SqliteConnection,
    ) -> Result<RenewalResult, WalletLedgerError> {
        let balance = self.materialize_in_tx(subscription.account_id, true, conn).await?.balance;
        if balance < subscription.amount {
            return Err(WalletLedgerError::InsufficientFunds {
                account_id: subscription.account_id,
                balance: balance.to_string(),
                required: subscription.amount.to_string(),
            });
        }
        let result = self.renew_in_tx(subscription, conn).await?;
        self.resync_balance(subscription.account_id, conn).await?;
        self.resync_balance(result.owner_credit.account_id, conn).await?;
        Ok(result)
    }

    async fn try_expire_subscription(&self, subscription: &Subscription) -> Result<Subscription, WalletLedgerError> {
        let mut conn = self.begin_write().await?;
        let result = async {
            let updated = subscriptions::set_status(subscription.id, SubscriptionStatus::Expired, &mut conn).await?;
            subscriptions::decrement_member_count(&subscription.community_id, &mut conn).await?;
            Ok::<_, WalletLedgerError>(updated)
        }
        .await;
        match result {
            Ok(updated) => {
                Self::commit(conn).await?;
                info!(
                    "🗓️ Subscription {} expired; access to {} revoked",
                    subscription.id, subscription.community_id
                );
                Ok(updated)
            },
            Err(e) => {
                Self::rollback(conn).await;
                Err(e)
            },
        }
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_wallet_account(&self, account_id: i64) -> Result<Option<WalletAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_id(account_id, &mut conn).await
    }

    async fn fetch_wallet_account_for_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<WalletAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_customer_id(customer_id, &mut conn).await
    }

    async fn fetch_ledger_entries(&self, account_id: i64, limit: i64) -> Result<Vec<LedgerEntry>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::entries_for_account(account_id, limit, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let record = payment_records::fetch_by_reference(reference, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_subscriptions_for_account(&self, account_id: i64) -> Result<Vec<Subscription>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::subscriptions_for_account(account_id, &mut conn).await
    }
}

impl WalletLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_or_create_account(&self, customer_id: &str) -> Result<WalletAccount, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_or_create_account(customer_id, &mut conn).await?;
        Ok(account)
    }

    async fn initiate_payment(&self, new_record: NewPaymentRecord) -> Result<PaymentRecord, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let reference = new_record.reference.clone();
        match payment_records::idempotent_insert(new_record, TransactionStatus::Pending, &mut conn).await {
            Ok(record) => {
                debug!("🗃️ Payment {reference} initiated for account {:?}", record.account_id);
                Ok(record)
            },
            Err(WalletLedgerError::PaymentAlreadyExists(_)) => {
                let existing = payment_records::fetch_by_reference(&reference, &mut conn)
                    .await?
                    .ok_or_else(|| WalletLedgerError::PaymentAlreadyExists(reference.clone()))?;
                if existing.status.is_terminal() {
                    Err(WalletLedgerError::PaymentAlreadyTerminal(reference, existing.status.to_string()))
                } else {
                    Ok(existing)
                }
            },
            Err(e) => Err(e),
        }
    }

    async fn apply_reconciliation(
        &self,
        txn: &ExternalTransaction,
        expected: Option<&ExpectedEffect>,
    ) -> Result<ReconcileOutcome, WalletLedgerError> {
        match retry_busy(|| self.try_apply_reconciliation(txn, expected)).await {
            // A concurrent caller won the insert race; its committed record is the answer.
            Err(WalletLedgerError::PaymentAlreadyExists(reference)) => self.read_existing_record(&reference).await,
            other => other,
        }
    }

    async fn balance_for_account(
        &self,
        account_id: i64,
        auto_migrate: bool,
    ) -> Result<BalanceSummary, WalletLedgerError> {
        retry_busy(|| self.try_balance_for_account(account_id, auto_migrate)).await
    }

    async fn purchase_with_wallet(&self, purchase: &NewPurchase) -> Result<PurchaseResult, WalletLedgerError> {
        retry_busy(|| self.try_purchase_with_wallet(purchase)).await
    }

    async fn subscriptions_due_for_notice(
        &self,
        window: NoticeWindow,
    ) -> Result<Vec<Subscription>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::due_for_notice(window, &mut conn).await
    }

    async fn mark_notice_sent(&self, subscription_id: i64, window: NoticeWindow) -> Result<(), WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::mark_notice_sent(subscription_id, window, &mut conn).await
    }

    async fn subscriptions_past_due(&self) -> Result<Vec<Subscription>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::past_due(&mut conn).await
    }

    async fn renew_subscription(&self, subscription: &Subscription) -> Result<RenewalResult, WalletLedgerError> {
        retry_busy(|| self.try_renew_subscription(subscription)).await
    }

    async fn expire_subscription(&self, subscription: &Subscription) -> Result<Subscription, WalletLedgerError> {
        retry_busy(|| self.try_expire_subscription(subscription)).await
    }

    async fn close(&mut self) -> Result<(), WalletLedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Re-runs a write flow when SQLite reports busy or locked. Safe because each attempt is one whole transaction that
/// rolled back before the error surfaced.
async fn retry_busy<T, F, Fut>(op: F) -> Result<T, WalletLedgerError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, WalletLedgerError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_busy() && attempt < MAX_BUSY_ATTEMPTS => {
                debug!("🔁️ Database busy on attempt {attempt}; retrying. {e}");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                attempt += 1;
            },
            other => return other,
        }
    }
}

/// Validation gate for reconciliation: the canonical status must be `Successful`, the amount must match the record
/// within one minor unit, and the currency must match exactly.
fn validate(record: &PaymentRecord, txn: &ExternalTransaction) -> Result<(), WalletLedgerError> {
    let reference = record.reference.clone();
    if txn.status != TransactionStatus::Successful {
        return Err(WalletLedgerError::TransactionNotSuccessful { reference, status: txn.status.to_string() });
    }
    if !record.currency.eq_ignore_ascii_case(&txn.currency) {
        return Err(WalletLedgerError::CurrencyMismatch {
            reference,
            expected: record.currency.clone(),
            actual: txn.currency.clone(),
        });
    }
    if record.amount.abs_diff(txn.amount) > MONEY_EPSILON {
        return Err(WalletLedgerError::AmountMismatch {
            reference,
            expected: record.amount.to_string(),
            actual: txn.amount.to_string(),
        });
    }
    Ok(())
}

fn recorded_failure(record: &PaymentRecord) -> WalletLedgerError {
    WalletLedgerError::AlreadyFailed {
        reference: record.reference.clone(),
        reason: record.last_error.clone().unwrap_or_else(|| "unspecified".to_string()),
    }
}
