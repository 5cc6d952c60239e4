//! Platform collection repository
//!
//! All status transitions are conditional UPDATEs guarded on the current
//! status (rows_affected checked), so a scheduler tick and a webhook
//! delivery racing on the same record cannot both win. The COLLECTED
//! finalization and the ledger mark-collected run in one transaction.

use super::{RepoError, RepoResult, external_transaction};
use shared::models::{NewCollection, PlatformCollection};
use shared::util;
use sqlx::{Sqlite, SqlitePool, Transaction};

const COLLECTION_COLUMNS: &str = "id, barber_id, collection_type, amount_cents, currency, status, collection_method, description, scheduled_at, attempted_at, collected_at, period_start, period_end, gateway_transaction_id, processing_fee_cents, net_amount_cents, failure_reason, retry_count, max_retries, last_attempt_at, created_at, updated_at";

/// Default attempt budget before a collection needs manual intervention
pub const DEFAULT_MAX_RETRIES: i64 = 3;

/// Insert a PENDING collection plus its ledger references.
///
/// Runs the double-collection guard inside the same transaction as the
/// insert: every referenced ledger row must belong to the barber, be
/// settled, be uncollected, and not be referenced by another live
/// (non-FAILED) collection.
pub async fn create(
    pool: &SqlitePool,
    data: &NewCollection,
    collection_method: shared::models::CollectionMethod,
) -> RepoResult<PlatformCollection> {
    let id = util::snowflake_id();
    let now = util::now_millis();

    let mut tx = pool.begin().await?;

    guard_transactions_available(&mut tx, data.barber_id, &data.related_transaction_ids).await?;

    sqlx::query(
        "INSERT INTO platform_collections (id, barber_id, collection_type, amount_cents, currency, status, collection_method, description, scheduled_at, period_start, period_end, retry_count, max_retries, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'USD', 'PENDING', ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)",
    )
    .bind(id)
    .bind(data.barber_id)
    .bind(data.collection_type)
    .bind(data.amount_cents)
    .bind(collection_method)
    .bind(&data.description)
    .bind(now)
    .bind(data.period_start)
    .bind(data.period_end)
    .bind(DEFAULT_MAX_RETRIES)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for txn_id in &data.related_transaction_ids {
        sqlx::query(
            "INSERT INTO collection_transactions (collection_id, transaction_id) VALUES (?, ?)",
        )
        .bind(id)
        .bind(*txn_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create collection".into()))
}

/// Double-collection guard: fail fast when any referenced ledger row is
/// ineligible. Exposed for the manual-retry path, which must re-check
/// before re-attempting a FAILED record (its rows may have been picked up
/// by a newer collection meanwhile).
pub async fn guard_transactions_available(
    tx: &mut Transaction<'_, Sqlite>,
    barber_id: i64,
    transaction_ids: &[i64],
) -> RepoResult<()> {
    if transaction_ids.is_empty() {
        return Ok(());
    }

    let txns = external_transaction::find_by_ids_tx(tx, transaction_ids).await?;
    if txns.len() != transaction_ids.len() {
        return Err(RepoError::NotFound(format!(
            "{} of {} referenced transactions do not exist",
            transaction_ids.len() - txns.len(),
            transaction_ids.len()
        )));
    }

    for txn in &txns {
        if txn.commission_collected {
            return Err(RepoError::Duplicate(format!(
                "transaction {} already commission-collected",
                txn.id
            )));
        }
        if !txn.status.is_settled() {
            return Err(RepoError::Validation(format!(
                "transaction {} is not settled ({})",
                txn.id,
                txn.status.as_str()
            )));
        }
    }

    // Ownership check: every row must hang off one of the barber's connections
    let placeholders = vec!["?"; transaction_ids.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*) FROM external_transactions t
         JOIN processor_connections c ON c.id = t.connection_id
         WHERE c.barber_id = ? AND t.id IN ({placeholders})"
    );
    let mut owned_query = sqlx::query_scalar::<_, i64>(&sql).bind(barber_id);
    for id in transaction_ids {
        owned_query = owned_query.bind(*id);
    }
    let owned: i64 = owned_query.fetch_one(&mut **tx).await?;
    if owned != transaction_ids.len() as i64 {
        return Err(RepoError::Validation(format!(
            "{} referenced transactions do not belong to barber {barber_id}",
            transaction_ids.len() as i64 - owned
        )));
    }

    // Live-reference check: no other PENDING/PROCESSING/COLLECTED collection
    // may already claim any of these rows
    let sql = format!(
        "SELECT ct.transaction_id FROM collection_transactions ct
         JOIN platform_collections pc ON pc.id = ct.collection_id
         WHERE pc.status != 'FAILED' AND ct.transaction_id IN ({placeholders})
         LIMIT 1"
    );
    let mut claimed_query = sqlx::query_scalar::<_, i64>(&sql);
    for id in transaction_ids {
        claimed_query = claimed_query.bind(*id);
    }
    if let Some(txn_id) = claimed_query.fetch_optional(&mut **tx).await? {
        return Err(RepoError::Duplicate(format!(
            "transaction {txn_id} already referenced by a live collection"
        )));
    }

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<PlatformCollection>> {
    let collection = sqlx::query_as::<_, PlatformCollection>(&format!(
        "SELECT {COLLECTION_COLUMNS} FROM platform_collections WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(collection)
}

pub async fn find_by_gateway_txn(
    pool: &SqlitePool,
    gateway_transaction_id: &str,
) -> RepoResult<Option<PlatformCollection>> {
    let collection = sqlx::query_as::<_, PlatformCollection>(&format!(
        "SELECT {COLLECTION_COLUMNS} FROM platform_collections WHERE gateway_transaction_id = ?"
    ))
    .bind(gateway_transaction_id)
    .fetch_optional(pool)
    .await?;
    Ok(collection)
}

/// Due PENDING collections, oldest scheduled first (long-overdue barbers
/// are never starved by newer records)
pub async fn find_due(
    pool: &SqlitePool,
    now: i64,
    limit: i64,
) -> RepoResult<Vec<PlatformCollection>> {
    let collections = sqlx::query_as::<_, PlatformCollection>(&format!(
        "SELECT {COLLECTION_COLUMNS} FROM platform_collections
         WHERE status = 'PENDING' AND scheduled_at <= ? AND retry_count < max_retries
         ORDER BY scheduled_at ASC
         LIMIT ?"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(collections)
}

/// Claim a collection for an attempt: PENDING/FAILED → PROCESSING with the
/// attempt counter bumped. Returns None when the record was not claimable
/// (wrong state, retries exhausted, or a concurrent claimer won).
pub async fn begin_attempt(
    pool: &SqlitePool,
    id: i64,
    now: i64,
) -> RepoResult<Option<PlatformCollection>> {
    let result = sqlx::query(
        "UPDATE platform_collections
         SET status = 'PROCESSING', retry_count = retry_count + 1,
             attempted_at = ?1, last_attempt_at = ?1, updated_at = ?1
         WHERE id = ?2 AND status IN ('PENDING', 'FAILED') AND retry_count < max_retries",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_by_id(pool, id).await
}

/// Record the rail-side reference on an in-flight PROCESSING record
/// (async rail accepted the debit; the webhook will close it out)
pub async fn record_gateway_acceptance(
    pool: &SqlitePool,
    id: i64,
    gateway_transaction_id: &str,
    processing_fee_cents: i64,
    net_amount_cents: i64,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE platform_collections
         SET gateway_transaction_id = ?, processing_fee_cents = ?, net_amount_cents = ?, updated_at = ?
         WHERE id = ? AND status = 'PROCESSING'",
    )
    .bind(gateway_transaction_id)
    .bind(processing_fee_cents)
    .bind(net_amount_cents)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Finalize a PROCESSING collection as COLLECTED and mark its ledger rows
/// collected in one transaction, so no crash window can separate the two.
///
/// Returns false (and changes nothing) when the record was not PROCESSING,
/// which makes duplicate webhook deliveries a no-op.
pub async fn finalize_collected(
    pool: &SqlitePool,
    id: i64,
    gateway_transaction_id: Option<&str>,
    processing_fee_cents: Option<i64>,
    net_amount_cents: Option<i64>,
    now: i64,
) -> RepoResult<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE platform_collections
         SET status = 'COLLECTED', collected_at = ?1,
             gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
             processing_fee_cents = COALESCE(?3, processing_fee_cents),
             net_amount_cents = COALESCE(?4, net_amount_cents),
             failure_reason = NULL, updated_at = ?1
         WHERE id = ?5 AND status = 'PROCESSING'",
    )
    .bind(now)
    .bind(gateway_transaction_id)
    .bind(processing_fee_cents)
    .bind(net_amount_cents)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    external_transaction::mark_collected(&mut tx, id, now).await?;

    tx.commit().await?;
    Ok(true)
}

/// Finalize a PROCESSING collection as failed. With `reschedule_at` the
/// record re-enters PENDING for a later retry; without it the failure is
/// terminal. Returns false when the record was not PROCESSING.
pub async fn finalize_failed(
    pool: &SqlitePool,
    id: i64,
    failure_reason: &str,
    reschedule_at: Option<i64>,
    now: i64,
) -> RepoResult<bool> {
    let result = match reschedule_at {
        Some(when) => {
            sqlx::query(
                "UPDATE platform_collections
                 SET status = 'PENDING', scheduled_at = ?, failure_reason = ?, updated_at = ?
                 WHERE id = ? AND status = 'PROCESSING'",
            )
            .bind(when)
            .bind(failure_reason)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE platform_collections
                 SET status = 'FAILED', failure_reason = ?, updated_at = ?
                 WHERE id = ? AND status = 'PROCESSING'",
            )
            .bind(failure_reason)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?
        }
    };
    Ok(result.rows_affected() == 1)
}

/// `collected_at` of the barber's most recent COLLECTED commission
/// collection, the default window start for the commission calculator
pub async fn last_collected_commission_at(
    pool: &SqlitePool,
    barber_id: i64,
) -> RepoResult<Option<i64>> {
    let collected_at: Option<Option<i64>> = sqlx::query_scalar(
        "SELECT collected_at FROM platform_collections
         WHERE barber_id = ? AND collection_type = 'COMMISSION' AND status = 'COLLECTED'
         ORDER BY collected_at DESC
         LIMIT 1",
    )
    .bind(barber_id)
    .fetch_optional(pool)
    .await?;
    Ok(collected_at.flatten())
}

/// An existing live booth-rent collection fully covering [start, end]
pub async fn booth_rent_covering(
    pool: &SqlitePool,
    barber_id: i64,
    period_start: i64,
    period_end: i64,
) -> RepoResult<Option<PlatformCollection>> {
    let collection = sqlx::query_as::<_, PlatformCollection>(&format!(
        "SELECT {COLLECTION_COLUMNS} FROM platform_collections
         WHERE barber_id = ? AND collection_type = 'BOOTH_RENT'
           AND status IN ('PENDING', 'PROCESSING', 'COLLECTED')
           AND period_start <= ? AND period_end >= ?
         ORDER BY created_at DESC
         LIMIT 1"
    ))
    .bind(barber_id)
    .bind(period_start)
    .bind(period_end)
    .fetch_optional(pool)
    .await?;
    Ok(collection)
}

/// Ledger rows referenced by a collection
pub async fn transaction_ids(pool: &SqlitePool, collection_id: i64) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT transaction_id FROM collection_transactions WHERE collection_id = ? ORDER BY transaction_id ASC",
    )
    .bind(collection_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}
