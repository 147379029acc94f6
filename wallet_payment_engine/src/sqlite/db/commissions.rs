use sqlx::SqliteConnection;

use crate::{
    db_types::{CommissionRecord, RevenueSplit},
    traits::WalletLedgerError,
};

pub async fn insert(
    purchase_ref: &str,
    owner_account_id: Option<i64>,
    split: &RevenueSplit,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<CommissionRecord, WalletLedgerError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO commission_records
                (purchase_ref, owner_account_id, gross_amount, commission_rate, platform_share, owner_share, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(purchase_ref)
    .bind(owner_account_id)
    .bind(split.gross_amount)
    .bind(split.commission_rate)
    .bind(split.platform_share)
    .bind(split.owner_share)
    .bind(currency)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn fetch_for_purchase(
    purchase_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRecord>, WalletLedgerError> {
    let record = sqlx::query_as(r#"SELECT * FROM commission_records WHERE purchase_ref = ?"#)
        .bind(purchase_ref)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}
