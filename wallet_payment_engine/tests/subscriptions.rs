//! Subscription renewal scheduling: staged notices, balance-funded renewal, expiry on insufficient funds.
use wallet_payment_engine::{
    db_types::{Money, NewLedgerEntry, NoticeWindow},
    events::EventProducers,
    sqlite::db::ledger,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AccountManagement,
    RenewalApi,
    SqliteDatabase,
    WalletLedgerDatabase,
};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

struct Fixture {
    member_id: i64,
    owner_id: i64,
    subscription_id: i64,
}

/// Seeds an owner, a community with one member, and a subscription whose billing date is `days_offset` days from now
/// (negative means past due).
async fn seed_subscription(db: &SqliteDatabase, days_offset: i64, member_balance: Money, auto_renew: bool) -> Fixture {
    let member = db.fetch_or_create_account(&format!("member-{days_offset}-{auto_renew}")).await.expect("member");
    let owner = db.fetch_or_create_account(&format!("owner-{days_offset}-{auto_renew}")).await.expect("owner");
    if member_balance.is_positive() {
        let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
        ledger::insert_entry(NewLedgerEntry::credit(member.id, member_balance, "NGN", "Wallet Funding"), &mut conn)
            .await
            .expect("Error funding member");
    }
    let community_id = format!("community-{}", member.id);
    sqlx::query("INSERT INTO communities (id, owner_account_id, member_count) VALUES (?, ?, 1)")
        .bind(&community_id)
        .bind(owner.id)
        .execute(db.pool())
        .await
        .expect("Error creating community");
    let (subscription_id,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (account_id, community_id, amount, currency, period_days, auto_renew,
                                       next_billing_date)
            VALUES (?, ?, ?, 'NGN', 30, ?, datetime('now', ? || ' days'))
            RETURNING id;
        "#,
    )
    .bind(member.id)
    .bind(&community_id)
    .bind(Money::from_major(50))
    .bind(auto_renew)
    .bind(days_offset)
    .fetch_one(db.pool())
    .await
    .expect("Error creating subscription");
    Fixture { member_id: member.id, owner_id: owner.id, subscription_id }
}

async fn member_count(db: &SqliteDatabase, member_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT member_count FROM communities WHERE id = ?")
        .bind(format!("community-{member_id}"))
        .fetch_one(db.pool())
        .await
        .expect("Error reading member count");
    count
}

#[tokio::test]
async fn past_due_with_funds_renews_from_balance() {
    let db = new_db().await;
    let fx = seed_subscription(&db, -1, Money::from_major(200), true).await;
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.renewed, 1);
    assert_eq!(summary.expired, 0);

    let member_balance = db.balance_for_account(fx.member_id, true).await.expect("member balance");
    assert_eq!(member_balance.balance, Money::from_major(150));
    let owner_balance = db.balance_for_account(fx.owner_id, true).await.expect("owner balance");
    assert_eq!(owner_balance.balance, Money::from_major(50));

    let subs = db.fetch_subscriptions_for_account(fx.member_id).await.expect("subs");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].status.to_string(), "Active");
    assert!(subs[0].next_billing_date > chrono::Utc::now());
    assert!(!subs[0].notice_7d_sent && !subs[0].notice_3d_sent && !subs[0].notice_1d_sent);

    // A second pass finds nothing to do.
    let summary = api.run_once().await.expect("Error running scheduler again");
    assert_eq!(summary.renewed, 0);
    assert_eq!(summary.expired, 0);
}

#[tokio::test]
async fn past_due_without_funds_expires_and_blocks_access() {
    let db = new_db().await;
    let fx = seed_subscription(&db, -2, Money::from(0), true).await;
    assert_eq!(member_count(&db, fx.member_id).await, 1);
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.renewed, 0);
    assert_eq!(summary.expired, 1);

    let subs = db.fetch_subscriptions_for_account(fx.member_id).await.expect("subs");
    assert_eq!(subs[0].status.to_string(), "Expired");
    assert_eq!(member_count(&db, fx.member_id).await, 0);
    // No money moved.
    let entries = db.fetch_ledger_entries(fx.member_id, 50).await.expect("entries");
    assert!(entries.is_empty());
    let _ = fx.subscription_id;
}

#[tokio::test]
async fn auto_renew_off_expires_even_with_funds() {
    let db = new_db().await;
    let fx = seed_subscription(&db, -1, Money::from_major(500), false).await;
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.renewed, 0);
    assert_eq!(summary.expired, 1);
    let balance = db.balance_for_account(fx.member_id, true).await.expect("balance");
    assert_eq!(balance.balance, Money::from_major(500));
}

#[tokio::test]
async fn legacy_balances_fund_renewals() {
    let db = new_db().await;
    let fx = seed_subscription(&db, -1, Money::from(0), true).await;
    // The member's funds predate the ledger; renewal must still see them.
    sqlx::query("UPDATE wallet_accounts SET cached_balance = ?, legacy_migrated = 0 WHERE id = ?")
        .bind(Money::from_major(80))
        .bind(fx.member_id)
        .execute(db.pool())
        .await
        .expect("Error seeding legacy balance");
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.renewed, 1);
    assert_eq!(summary.expired, 0);
    let balance = db.balance_for_account(fx.member_id, true).await.expect("balance");
    assert_eq!(balance.balance, Money::from_major(30)); // 80 legacy minus the 50 fee
}

#[tokio::test]
async fn notices_go_out_even_when_auto_renew_is_off() {
    let db = new_db().await;
    let fx = seed_subscription(&db, 2, Money::from_major(100), false).await;
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    // Two days out: the 7-day and 3-day warnings are due whether or not the member will auto-renew.
    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.notices_sent, 2);
    assert_eq!(summary.renewed, 0);
    assert_eq!(summary.expired, 0);

    let subs = db.fetch_subscriptions_for_account(fx.member_id).await.expect("subs");
    assert!(subs[0].notice_7d_sent);
    assert!(subs[0].notice_3d_sent);
    assert!(!subs[0].notice_1d_sent);
}

#[tokio::test]
async fn each_notice_window_fires_exactly_once() {
    let db = new_db().await;
    let fx = seed_subscription(&db, 2, Money::from_major(100), true).await;
    let api = RenewalApi::new(db.clone(), EventProducers::default());

    // Two days out: inside the 7-day and 3-day windows, outside the 1-day window.
    let summary = api.run_once().await.expect("Error running scheduler");
    assert_eq!(summary.notices_sent, 2);
    assert_eq!(summary.renewed, 0);

    let subs = db.fetch_subscriptions_for_account(fx.member_id).await.expect("subs");
    assert!(subs[0].notice_7d_sent);
    assert!(subs[0].notice_3d_sent);
    assert!(!subs[0].notice_1d_sent);

    // Re-running sends nothing new.
    let summary = api.run_once().await.expect("Error running scheduler again");
    assert_eq!(summary.notices_sent, 0);
}

#[tokio::test]
async fn due_query_respects_the_window_flags() {
    let db = new_db().await;
    let fx = seed_subscription(&db, 1, Money::from_major(100), true).await;

    let due = db.subscriptions_due_for_notice(NoticeWindow::OneDay).await.expect("due");
    assert_eq!(due.len(), 1);
    db.mark_notice_sent(fx.subscription_id, NoticeWindow::OneDay).await.expect("mark");
    let due = db.subscriptions_due_for_notice(NoticeWindow::OneDay).await.expect("due");
    assert!(due.is_empty());
}
