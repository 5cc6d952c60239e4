//! External transaction ledger repository
//!
//! Rows come in from the barber's own processor feed and are never
//! deleted. The only mutation is the collected mark, applied by
//! [`mark_collected`] inside the finalizing transaction of a collection.

use super::{RepoError, RepoResult};
use shared::models::{
    ExternalTransaction, ExternalTransactionCreate, ProcessorConnection,
    ProcessorConnectionCreate,
};
use shared::{money, util};
use sqlx::{Sqlite, SqlitePool, Transaction};

const TXN_COLUMNS: &str = "id, connection_id, appointment_id, amount_cents, commission_rate_bps, commission_cents, processed_at, status, commission_collected, commission_collected_at, created_at";

pub async fn create_connection(
    pool: &SqlitePool,
    data: ProcessorConnectionCreate,
) -> RepoResult<ProcessorConnection> {
    let id = util::snowflake_id();
    let now = util::now_millis();
    sqlx::query(
        "INSERT INTO processor_connections (id, barber_id, processor, external_account_ref, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(data.barber_id)
    .bind(&data.processor)
    .bind(&data.external_account_ref)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ProcessorConnection {
        id,
        barber_id: data.barber_id,
        processor: data.processor,
        external_account_ref: data.external_account_ref,
        created_at: now,
    })
}

/// Record one externally-processed charge. The commission amount is derived
/// here, once, at write time. Downstream reads never recompute it.
pub async fn record(
    pool: &SqlitePool,
    data: ExternalTransactionCreate,
) -> RepoResult<ExternalTransaction> {
    if data.amount_cents < 0 {
        return Err(RepoError::Validation(format!(
            "amount_cents cannot be negative: {}",
            data.amount_cents
        )));
    }
    if !(0..=money::BPS_DENOMINATOR).contains(&data.commission_rate_bps) {
        return Err(RepoError::Validation(format!(
            "commission_rate_bps must be within 0..=10000: {}",
            data.commission_rate_bps
        )));
    }

    let id = util::snowflake_id();
    let now = util::now_millis();
    let commission_cents = money::commission_cents(data.amount_cents, data.commission_rate_bps);

    sqlx::query(
        "INSERT INTO external_transactions (id, connection_id, appointment_id, amount_cents, commission_rate_bps, commission_cents, processed_at, status, commission_collected, commission_collected_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)",
    )
    .bind(id)
    .bind(data.connection_id)
    .bind(data.appointment_id)
    .bind(data.amount_cents)
    .bind(data.commission_rate_bps)
    .bind(commission_cents)
    .bind(data.processed_at)
    .bind(data.status.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to record external transaction".into()))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<ExternalTransaction>> {
    let txn = sqlx::query_as::<_, ExternalTransaction>(&format!(
        "SELECT {TXN_COLUMNS} FROM external_transactions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(txn)
}

/// Uncollected, settled charges of one barber inside a time window,
/// oldest first. Pure read; this is the commission calculator's input.
pub async fn find_uncollected(
    pool: &SqlitePool,
    barber_id: i64,
    start_millis: i64,
    end_millis: i64,
) -> RepoResult<Vec<ExternalTransaction>> {
    let txns = sqlx::query_as::<_, ExternalTransaction>(
        "SELECT t.id, t.connection_id, t.appointment_id, t.amount_cents, t.commission_rate_bps, t.commission_cents, t.processed_at, t.status, t.commission_collected, t.commission_collected_at, t.created_at
         FROM external_transactions t
         JOIN processor_connections c ON c.id = t.connection_id
         WHERE c.barber_id = ?
           AND t.commission_collected = 0
           AND t.status IN ('SUCCEEDED', 'COMPLETED')
           AND t.processed_at >= ? AND t.processed_at <= ?
         ORDER BY t.processed_at ASC",
    )
    .bind(barber_id)
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await?;
    Ok(txns)
}

/// Fetch a set of ledger rows by id (guard checks before referencing them
/// in a new collection). Runs inside the caller's transaction.
pub async fn find_by_ids_tx(
    tx: &mut Transaction<'_, Sqlite>,
    ids: &[i64],
) -> RepoResult<Vec<ExternalTransaction>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {TXN_COLUMNS} FROM external_transactions WHERE id IN ({placeholders})"
    );
    let mut query = sqlx::query_as::<_, ExternalTransaction>(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    let txns = query.fetch_all(&mut **tx).await?;
    Ok(txns)
}

/// Mark every ledger row referenced by a collection as collected.
///
/// MUST run in the same transaction as the PROCESSING→COLLECTED status
/// flip: a crash between the two would either re-collect money already
/// pulled or strand money the ledger forgot about.
pub async fn mark_collected(
    tx: &mut Transaction<'_, Sqlite>,
    collection_id: i64,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE external_transactions
         SET commission_collected = 1, commission_collected_at = ?
         WHERE commission_collected = 0
           AND id IN (SELECT transaction_id FROM collection_transactions WHERE collection_id = ?)",
    )
    .bind(now)
    .bind(collection_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}
