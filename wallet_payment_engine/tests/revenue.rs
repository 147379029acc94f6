//! Revenue splits for wallet-funded marketplace purchases.
use wallet_payment_engine::{
    db_types::{Money, NewLedgerEntry, NewPurchase},
    sqlite::db::ledger,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
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

async fn funded_buyer(db: &SqliteDatabase, customer_id: &str, amount: Money) -> i64 {
    let account = db.fetch_or_create_account(customer_id).await.expect("Error creating account");
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    ledger::insert_entry(NewLedgerEntry::credit(account.id, amount, "NGN", "Wallet Funding"), &mut conn)
        .await
        .expect("Error funding buyer");
    account.id
}

async fn owner_with_rate(db: &SqliteDatabase, customer_id: &str, rate: Option<f64>) -> i64 {
    let account = db.fetch_or_create_account(customer_id).await.expect("Error creating account");
    if let Some(rate) = rate {
        sqlx::query("UPDATE wallet_accounts SET commission_rate = ? WHERE id = ?")
            .bind(rate)
            .bind(account.id)
            .execute(db.pool())
            .await
            .expect("Error setting commission rate");
    }
    account.id
}

fn ebook_purchase(buyer: i64, owner: Option<i64>, gross: Money, reference: &str) -> NewPurchase {
    NewPurchase {
        buyer_account_id: buyer,
        owner_account_id: owner,
        gross_amount: gross,
        currency: "NGN".to_string(),
        item_description: "E-book: Intro to Thermodynamics".to_string(),
        reference: reference.to_string(),
    }
}

#[tokio::test]
async fn a_1000_ngn_ebook_at_15_percent_splits_850_to_the_owner() {
    let db = new_db().await;
    let buyer = funded_buyer(&db, "student-1", Money::from_major(5000)).await;
    let owner = owner_with_rate(&db, "tutor-1", Some(15.0)).await;

    let result = db
        .purchase_with_wallet(&ebook_purchase(buyer, Some(owner), Money::from_major(1000), "PUR-1"))
        .await
        .expect("Error settling purchase");

    assert_eq!(result.split.platform_share, Money::from_major(150));
    assert_eq!(result.split.owner_share, Money::from_major(850));
    assert_eq!(result.split.platform_share + result.split.owner_share, Money::from_major(1000));
    assert_eq!(result.buyer_debit.amount, Money::from_major(1000));
    assert_eq!(result.buyer_balance, Money::from_major(4000));

    let owner_credit = result.owner_credit.expect("Owner credit missing");
    assert_eq!(owner_credit.amount, Money::from_major(850));
    assert_eq!(owner_credit.account_id, owner);
    let owner_balance = db.balance_for_account(owner, true).await.expect("Error reading owner balance");
    assert_eq!(owner_balance.balance, Money::from_major(850));

    assert_eq!(result.commission.platform_share, Money::from_major(150));
    assert_eq!(result.commission.purchase_ref, "PUR-1");
}

#[tokio::test]
async fn owners_without_a_rate_get_the_platform_default() {
    let db = new_db().await;
    let buyer = funded_buyer(&db, "student-2", Money::from_major(2000)).await;
    let owner = owner_with_rate(&db, "tutor-2", None).await;

    let result = db
        .purchase_with_wallet(&ebook_purchase(buyer, Some(owner), Money::from_major(200), "PUR-2"))
        .await
        .expect("Error settling purchase");
    // Platform default commission is 15%.
    assert_eq!(result.split.commission_rate, 15.0);
    assert_eq!(result.split.platform_share, Money::from_major(30));
    assert_eq!(result.split.owner_share, Money::from_major(170));
}

#[tokio::test]
async fn platform_owned_items_keep_the_full_gross() {
    let db = new_db().await;
    let buyer = funded_buyer(&db, "student-3", Money::from_major(1000)).await;

    let result = db
        .purchase_with_wallet(&ebook_purchase(buyer, None, Money::from_major(300), "PUR-3"))
        .await
        .expect("Error settling purchase");

    assert!(result.owner_credit.is_none());
    assert_eq!(result.split.platform_share, Money::from_major(300));
    assert_eq!(result.split.owner_share, Money::from(0));
    assert_eq!(result.commission.owner_account_id, None);
    // Only the buyer's debit hits the ledger.
    let entries = db.fetch_ledger_entries(buyer, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 2); // funding credit + purchase debit
}

#[tokio::test]
async fn insufficient_balance_rejects_the_purchase_without_writes() {
    let db = new_db().await;
    let buyer = funded_buyer(&db, "student-4", Money::from_major(100)).await;
    let owner = owner_with_rate(&db, "tutor-4", Some(10.0)).await;

    let err = db
        .purchase_with_wallet(&ebook_purchase(buyer, Some(owner), Money::from_major(500), "PUR-4"))
        .await
        .expect_err("Underfunded purchase must fail");
    assert!(matches!(err, WalletLedgerError::InsufficientFunds { .. }));

    let entries = db.fetch_ledger_entries(buyer, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 1); // just the original funding
    let balance = db.balance_for_account(buyer, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from_major(100));
}

#[tokio::test]
async fn unmigrated_legacy_balances_count_toward_purchases() {
    let db = new_db().await;
    let buyer = db.fetch_or_create_account("legacy-student").await.expect("Error creating account").id;
    // A pre-ledger account whose stored balance has not been migrated yet.
    sqlx::query("UPDATE wallet_accounts SET cached_balance = ?, legacy_migrated = 0 WHERE id = ?")
        .bind(Money::from_major(500))
        .bind(buyer)
        .execute(db.pool())
        .await
        .expect("Error seeding legacy balance");
    let owner = owner_with_rate(&db, "tutor-6", Some(15.0)).await;

    let result = db
        .purchase_with_wallet(&ebook_purchase(buyer, Some(owner), Money::from_major(300), "PUR-6"))
        .await
        .expect("Legacy funds must cover the purchase");
    assert_eq!(result.buyer_balance, Money::from_major(200));

    let entries = db.fetch_ledger_entries(buyer, 50).await.expect("Error fetching entries");
    assert_eq!(entries.len(), 2); // migration credit + purchase debit
    let account = db.fetch_wallet_account(buyer).await.expect("Error fetching account").expect("Account exists");
    assert!(account.legacy_migrated);
    assert_eq!(account.cached_balance, Money::from_major(200));
}

#[tokio::test]
async fn awkward_rates_still_sum_exactly() {
    let db = new_db().await;
    let buyer = funded_buyer(&db, "student-5", Money::from_major(100)).await;
    let owner = owner_with_rate(&db, "tutor-5", Some(12.5)).await;

    // 12.5% of 10.01 rounds the platform share once; the owner share absorbs the remainder.
    let result = db
        .purchase_with_wallet(&ebook_purchase(buyer, Some(owner), Money::from(1001), "PUR-5"))
        .await
        .expect("Error settling purchase");
    assert_eq!(result.split.platform_share, Money::from(125));
    assert_eq!(result.split.owner_share, Money::from(876));
    assert_eq!(result.split.platform_share + result.split.owner_share, Money::from(1001));
}
