use sqlx::SqliteConnection;
use wpg_common::Money;

use crate::{
    db_types::{EntryDirection, LedgerEntry, NewLedgerEntry},
    traits::WalletLedgerError,
};

/// The authoritative balance for an account: the signed sum over its ledger entries.
pub async fn ledger_balance(account_id: i64, conn: &mut SqliteConnection) -> Result<Money, WalletLedgerError> {
    let (balance,): (i64,) = sqlx::query_as(
        r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'Credit' THEN amount ELSE -amount END), 0)
            FROM ledger_entries WHERE account_id = ?
        "#,
    )
    .bind(account_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from(balance))
}

/// Appends a ledger entry. The entry's `resulting_balance` snapshot is derived inside the same transaction as the
/// insert, so it is consistent with the entries that precede it.
pub async fn insert_entry(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, WalletLedgerError> {
    let prior = ledger_balance(entry.account_id, conn).await?;
    let resulting = match entry.direction {
        EntryDirection::Credit => prior + entry.amount,
        EntryDirection::Debit => prior - entry.amount,
    };
    let row = sqlx::query_as(
        r#"
            INSERT INTO ledger_entries
                (account_id, amount, direction, currency, service_name, external_ref, period_tag, resulting_balance)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(entry.account_id)
    .bind(entry.amount)
    .bind(entry.direction.to_string())
    .bind(entry.currency)
    .bind(entry.service_name)
    .bind(entry.external_ref)
    .bind(entry.period_tag)
    .bind(resulting)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Whether the account already has its one-time legacy migration entry.
pub async fn has_migration_entry(account_id: i64, conn: &mut SqliteConnection) -> Result<bool, WalletLedgerError> {
    let (count,): (i64,) =
        sqlx::query_as(r#"SELECT COUNT(*) FROM ledger_entries WHERE account_id = ? AND service_name = ?"#)
            .bind(account_id)
            .bind(crate::db_types::MIGRATION_SERVICE_NAME)
            .fetch_one(conn)
            .await?;
    Ok(count > 0)
}

pub async fn entries_for_account(
    account_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let entries =
        sqlx::query_as(r#"SELECT * FROM ledger_entries WHERE account_id = ? ORDER BY id DESC LIMIT ?"#)
            .bind(account_id)
            .bind(limit)
            .fetch_all(conn)
            .await?;
    Ok(entries)
}
