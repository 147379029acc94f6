use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NoticeWindow, Subscription, SubscriptionStatus},
    traits::{AccountApiError, WalletLedgerError},
};

pub async fn subscription_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, WalletLedgerError> {
    let sub = sqlx::query_as(r#"SELECT * FROM subscriptions WHERE id = ?"#).bind(id).fetch_optional(conn).await?;
    Ok(sub)
}

pub async fn subscriptions_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, AccountApiError> {
    let subs = sqlx::query_as(r#"SELECT * FROM subscriptions WHERE account_id = ? ORDER BY next_billing_date"#)
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(subs)
}

/// Active subscriptions entering the notice window that have not been notified for it yet.
///
/// Auto-renew plays no part here; it only gates the renew-vs-expire decision once the billing date passes. A member
/// who turned renewal off still gets warned before losing access.
///
/// The flag column name comes from [`NoticeWindow::flag_column`], a closed set, so interpolating it is safe.
pub async fn due_for_notice(
    window: NoticeWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, WalletLedgerError> {
    let q = format!(
        r#"
            SELECT * FROM subscriptions
            WHERE status = 'Active' AND {flag} = 0
              AND next_billing_date <= datetime('now', '+{days} days')
              AND next_billing_date > datetime('now')
        "#,
        flag = window.flag_column(),
        days = window.days(),
    );
    let subs = sqlx::query_as(&q).fetch_all(conn).await?;
    Ok(subs)
}

pub async fn mark_notice_sent(
    subscription_id: i64,
    window: NoticeWindow,
    conn: &mut SqliteConnection,
) -> Result<(), WalletLedgerError> {
    let q = format!(
        r#"UPDATE subscriptions SET {flag} = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?"#,
        flag = window.flag_column(),
    );
    sqlx::query(&q).bind(subscription_id).execute(conn).await?;
    Ok(())
}

pub async fn past_due(conn: &mut SqliteConnection) -> Result<Vec<Subscription>, WalletLedgerError> {
    let subs = sqlx::query_as(
        r#"SELECT * FROM subscriptions WHERE status = 'Active' AND next_billing_date <= datetime('now')"#,
    )
    .fetch_all(conn)
    .await?;
    Ok(subs)
}

/// Advances the billing date after a successful renewal and re-arms the notice flags for the new period.
pub async fn advance_billing_date(
    subscription_id: i64,
    next_billing_date: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Subscription, WalletLedgerError> {
    let sub = sqlx::query_as(
        r#"
            UPDATE subscriptions
            SET next_billing_date = $1,
                notice_7d_sent = 0, notice_3d_sent = 0, notice_1d_sent = 0,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(next_billing_date)
    .bind(subscription_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::SubscriptionNotFound(subscription_id))?;
    Ok(sub)
}

pub async fn set_status(
    subscription_id: i64,
    status: SubscriptionStatus,
    conn: &mut SqliteConnection,
) -> Result<Subscription, WalletLedgerError> {
    let sub = sqlx::query_as(
        r#"UPDATE subscriptions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *"#,
    )
    .bind(status.to_string())
    .bind(subscription_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::SubscriptionNotFound(subscription_id))?;
    Ok(sub)
}

/// The community owner's account id, for routing renewal fees.
pub async fn community_owner(
    community_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, WalletLedgerError> {
    let owner: Option<(i64,)> = sqlx::query_as(r#"SELECT owner_account_id FROM communities WHERE id = ?"#)
        .bind(community_id)
        .fetch_optional(conn)
        .await?;
    Ok(owner.map(|(id,)| id))
}

pub async fn decrement_member_count(community_id: &str, conn: &mut SqliteConnection) -> Result<(), WalletLedgerError> {
    sqlx::query(r#"UPDATE communities SET member_count = MAX(member_count - 1, 0) WHERE id = ?"#)
        .bind(community_id)
        .execute(conn)
        .await?;
    Ok(())
}
