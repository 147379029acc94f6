use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentRecord, PaymentRecord, TransactionStatus},
    traits::WalletLedgerError,
};

/// Inserts a `Pending` payment record. The unique constraint on `reference` makes this the arbiter for concurrent
/// sightings of the same transaction: the loser gets [`WalletLedgerError::PaymentAlreadyExists`] and must re-read.
pub async fn idempotent_insert(
    record: NewPaymentRecord,
    status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, WalletLedgerError> {
    let reference = record.reference.clone();
    let purchase_json = match &record.purchase {
        Some(p) => Some(
            serde_json::to_string(p).map_err(|e| WalletLedgerError::DatabaseError(e.to_string()))?,
        ),
        None => None,
    };
    let record = sqlx::query_as(
        r#"
            INSERT INTO payment_records
                (reference, amount, currency, status, payment_type, account_id, period_tag, subscription_id,
                 purchase_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(record.reference)
    .bind(record.amount)
    .bind(record.currency)
    .bind(status.to_string())
    .bind(record.payment_type.to_string())
    .bind(record.account_id)
    .bind(record.period_tag)
    .bind(record.subscription_id)
    .bind(purchase_json)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => WalletLedgerError::PaymentAlreadyExists(reference),
        _ => WalletLedgerError::from(e),
    })?;
    Ok(record)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    sqlx::query_as(r#"SELECT * FROM payment_records WHERE reference = ?"#).bind(reference).fetch_optional(conn).await
}

pub async fn fetch_by_gateway_id(
    gateway_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, sqlx::Error> {
    sqlx::query_as(r#"SELECT * FROM payment_records WHERE gateway_id = ?"#).bind(gateway_id).fetch_optional(conn).await
}

/// Transitions the record to a terminal state, stamping `processed_at` and backfilling the gateway id if the
/// triggering event carried one.
///
/// The status guard makes terminality one-way: if another caller already finished this reference, no row matches and
/// `None` is returned, so the caller knows to take the replay path instead of double-applying.
pub async fn set_terminal(
    reference: &str,
    status: TransactionStatus,
    gateway_id: Option<&str>,
    last_error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, WalletLedgerError> {
    let record = sqlx::query_as(
        r#"
            UPDATE payment_records
            SET status = $1,
                gateway_id = COALESCE($2, gateway_id),
                last_error = $3,
                processed_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $4 AND status NOT IN ('Successful', 'Failed')
            RETURNING *;
        "#,
    )
    .bind(status.to_string())
    .bind(gateway_id)
    .bind(last_error)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub async fn record_verification_attempt(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<(), WalletLedgerError> {
    sqlx::query(
        r#"
            UPDATE payment_records
            SET verification_attempts = verification_attempts + 1, updated_at = CURRENT_TIMESTAMP
            WHERE reference = ?
        "#,
    )
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(())
}
