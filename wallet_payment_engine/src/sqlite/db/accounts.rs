use sqlx::SqliteConnection;
use wpg_common::Money;

use crate::{db_types::WalletAccount, traits::AccountApiError};

pub async fn account_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<WalletAccount>, AccountApiError> {
    let account = sqlx::query_as(r#"SELECT * FROM wallet_accounts WHERE id = ?"#).bind(id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn account_by_customer_id(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletAccount>, AccountApiError> {
    let account = sqlx::query_as(r#"SELECT * FROM wallet_accounts WHERE customer_id = ?"#)
        .bind(customer_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

/// Fetches the account for `customer_id`, creating one with a zero balance (and nothing to migrate) if none exists.
pub async fn fetch_or_create_account(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<WalletAccount, AccountApiError> {
    if let Some(account) = account_by_customer_id(customer_id, conn).await? {
        return Ok(account);
    }
    let account = sqlx::query_as(
        r#"
            INSERT INTO wallet_accounts (customer_id, legacy_migrated) VALUES ($1, 1)
            ON CONFLICT (customer_id) DO UPDATE SET updated_at = updated_at
            RETURNING *;
        "#,
    )
    .bind(customer_id)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

/// The platform's first-party account, seeded by the schema migration.
pub async fn platform_account(conn: &mut SqliteConnection) -> Result<WalletAccount, AccountApiError> {
    sqlx::query_as(r#"SELECT * FROM wallet_accounts WHERE is_platform = 1 LIMIT 1"#)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AccountApiError::DatabaseError("No platform account exists".to_string()))
}

/// Resynchronizes the cached balance to the given (ledger-derived) value.
pub async fn set_cached_balance(
    account_id: i64,
    balance: Money,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query(
        r#"UPDATE wallet_accounts SET cached_balance = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2"#,
    )
    .bind(balance)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Marks the one-time legacy balance migration as complete and resyncs the cache in the same statement.
pub async fn mark_migrated(
    account_id: i64,
    balance: Money,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query(
        r#"
            UPDATE wallet_accounts SET legacy_migrated = 1, cached_balance = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
        "#,
    )
    .bind(balance)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(())
}
