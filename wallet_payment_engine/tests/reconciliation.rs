//! Exactly-once reconciliation of external gateway transactions, under replays, races and bad payloads.
use serde_json::json;
use wallet_payment_engine::{
    db_types::{ExternalTransaction, Money, NewPaymentRecord, PaymentType, TransactionStatus},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::ReconcileOutcome,
    AccountManagement,
    SqliteDatabase,
    WalletLedgerDatabase,
    WalletLedgerError,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn successful_txn(reference: &str, amount: Money) -> ExternalTransaction {
    ExternalTransaction {
        reference: Some(reference.to_string()),
        gateway_id: Some(format!("gw-{reference}")),
        amount,
        currency: "NGN".to_string(),
        status: TransactionStatus::Successful,
        raw_payload: json!({"tx_ref": reference}),
    }
}

async fn funded_account(db: &SqliteDatabase, customer_id: &str) -> i64 {
    db.fetch_or_create_account(customer_id).await.expect("Error creating account").id
}

#[tokio::test]
async fn webhook_funding_credits_exactly_once() {
    let db = new_db().await;
    let account_id = funded_account(&db, "alice").await;
    let record = NewPaymentRecord::new("TX-1", Money::from(500_000), "NGN", PaymentType::WalletFunding, account_id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn = successful_txn("TX-1", Money::from(500_000));
    let outcome = db.apply_reconciliation(&txn, None).await.expect("Error reconciling");
    let ReconcileOutcome::Applied { record, entries, new_balance, .. } = outcome else {
        panic!("First delivery should apply");
    };
    assert_eq!(record.status, TransactionStatus::Successful);
    assert_eq!(record.gateway_id.as_deref(), Some("gw-TX-1"));
    assert_eq!(entries.len(), 1);
    assert_eq!(new_balance, Money::from(500_000));

    // Webhook retry: same event again. No new entries, balance unchanged.
    let outcome = db.apply_reconciliation(&txn, None).await.expect("Error reconciling replay");
    assert!(matches!(outcome, ReconcileOutcome::AlreadyProcessed { .. }));
    let balance = db.balance_for_account(account_id, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from(500_000));
    let entries = db.fetch_ledger_entries(account_id, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn webhook_by_gateway_id_matches_the_verify_record() {
    let db = new_db().await;
    let account_id = funded_account(&db, "bob").await;
    let record = NewPaymentRecord::new("TX-2", Money::from(100_000), "NGN", PaymentType::WalletFunding, account_id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn = successful_txn("TX-2", Money::from(100_000));
    db.apply_reconciliation(&txn, None).await.expect("Error reconciling");

    // Late webhook carrying only the gateway id for the same underlying event.
    let late = ExternalTransaction { reference: None, ..successful_txn("TX-2", Money::from(100_000)) };
    let outcome = db.apply_reconciliation(&late, None).await.expect("Error reconciling late webhook");
    assert!(matches!(outcome, ReconcileOutcome::AlreadyProcessed { .. }));
    let entries = db.fetch_ledger_entries(account_id, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn unknown_references_are_acknowledged_without_effect() {
    let db = new_db().await;
    let txn = successful_txn("TX-NOBODY-ASKED-FOR", Money::from(1_000_000));
    let outcome = db.apply_reconciliation(&txn, None).await.expect("Error reconciling");
    assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));
    assert!(db.fetch_payment_record("TX-NOBODY-ASKED-FOR").await.expect("Error fetching record").is_none());
}

#[tokio::test]
async fn amount_mismatch_fails_the_record_without_ledger_writes() {
    let db = new_db().await;
    let account_id = funded_account(&db, "carol").await;
    let record = NewPaymentRecord::new("TX-3", Money::from(500_000), "NGN", PaymentType::WalletFunding, account_id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn = successful_txn("TX-3", Money::from(400_000));
    let err = db.apply_reconciliation(&txn, None).await.expect_err("Mismatch must be an error");
    assert!(matches!(err, WalletLedgerError::AmountMismatch { .. }));

    let record = db.fetch_payment_record("TX-3").await.expect("Error fetching record").expect("Record should exist");
    assert_eq!(record.status, TransactionStatus::Failed);
    assert!(record.last_error.is_some());
    let entries = db.fetch_ledger_entries(account_id, 50).await.expect("Error fetching entries");
    assert!(entries.is_empty());

    // A later replay (even with the correct amount) reports the recorded failure; the state machine is one-way.
    let good = successful_txn("TX-3", Money::from(500_000));
    let err = db.apply_reconciliation(&good, None).await.expect_err("Failed records must not be re-processed");
    let WalletLedgerError::AlreadyFailed { reference, reason } = err else {
        panic!("Replaying a failed record must report the recorded failure");
    };
    assert_eq!(reference, "TX-3");
    assert!(reason.contains("mismatch"));
    let entries = db.fetch_ledger_entries(account_id, 50).await.expect("Error fetching entries");
    assert!(entries.is_empty());
}

#[tokio::test]
async fn failed_gateway_status_records_the_failure() {
    let db = new_db().await;
    let account_id = funded_account(&db, "dave").await;
    let record = NewPaymentRecord::new("TX-4", Money::from(250_000), "NGN", PaymentType::WalletFunding, account_id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn =
        ExternalTransaction { status: TransactionStatus::Failed, ..successful_txn("TX-4", Money::from(250_000)) };
    let err = db.apply_reconciliation(&txn, None).await.expect_err("Failed status must be an error");
    assert!(matches!(err, WalletLedgerError::TransactionNotSuccessful { .. }));
    let balance = db.balance_for_account(account_id, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from(0));
}

#[tokio::test]
async fn concurrent_deliveries_produce_one_ledger_entry() {
    let db = new_db().await;
    let account_id = funded_account(&db, "eve").await;
    let record = NewPaymentRecord::new("TX-5", Money::from(750_000), "NGN", PaymentType::WalletFunding, account_id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn = successful_txn("TX-5", Money::from(750_000));
    let (a, b) = tokio::join!(db.apply_reconciliation(&txn, None), db.apply_reconciliation(&txn, None));
    let a = a.expect("First caller errored");
    let b = b.expect("Second caller errored");
    let applied = [&a, &b].iter().filter(|o| o.was_applied()).count();
    assert_eq!(applied, 1, "Exactly one caller may apply the transaction");

    let entries = db.fetch_ledger_entries(account_id, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 1);
    let balance = db.balance_for_account(account_id, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from(750_000));
}

#[tokio::test]
async fn school_fees_settle_as_a_credit_debit_pair() {
    let db = new_db().await;
    let account_id = funded_account(&db, "fred").await;
    let record =
        NewPaymentRecord::new("TX-6", Money::from(2_000_000), "NGN", PaymentType::SchoolFees, account_id)
            .with_period_tag("2026/2027-1");
    db.initiate_payment(record).await.expect("Error initiating payment");

    let txn = successful_txn("TX-6", Money::from(2_000_000));
    let outcome = db.apply_reconciliation(&txn, None).await.expect("Error reconciling");
    let ReconcileOutcome::Applied { entries, new_balance, .. } = outcome else {
        panic!("First delivery should apply");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(new_balance, Money::from(0));
    let debit = entries.iter().find(|e| e.service_name == "School Fees").expect("Fee debit missing");
    assert_eq!(debit.period_tag.as_deref(), Some("2026/2027-1"));
    assert_eq!(debit.external_ref.as_deref(), Some("TX-6"));
}

#[tokio::test]
async fn initiation_is_idempotent_until_terminal() {
    let db = new_db().await;
    let account_id = funded_account(&db, "grace").await;
    let record = NewPaymentRecord::new("TX-7", Money::from(10_000), "NGN", PaymentType::WalletFunding, account_id);
    let first = db.initiate_payment(record.clone()).await.expect("Error initiating payment");
    let second = db.initiate_payment(record.clone()).await.expect("Re-initiating a pending payment is fine");
    assert_eq!(first.id, second.id);

    let txn = successful_txn("TX-7", Money::from(10_000));
    db.apply_reconciliation(&txn, None).await.expect("Error reconciling");
    let err = db.initiate_payment(record).await.expect_err("Terminal references must not be re-initiated");
    assert!(matches!(err, WalletLedgerError::PaymentAlreadyTerminal(_, _)));
}
