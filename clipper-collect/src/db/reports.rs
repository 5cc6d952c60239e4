//! Reporting aggregates
//!
//! Read-only rollups consumed by the financial dashboard. Everything here
//! is recomputed from the ledger and collection tables; nothing is a
//! source of truth.

use super::RepoResult;
use shared::models::{BarberRevenue, BoothRentRollup, PayoutSummary, StatusBucket};
use shared::util;
use sqlx::SqlitePool;

/// Platform-wide payout summary for collections created in [from, to]
pub async fn payout_summary(pool: &SqlitePool, from: i64, to: i64) -> RepoResult<PayoutSummary> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*), COALESCE(SUM(amount_cents), 0)
         FROM platform_collections
         WHERE created_at >= ? AND created_at <= ?
         GROUP BY status",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut summary = PayoutSummary::default();
    for (status, count, amount_cents) in rows {
        let bucket = StatusBucket {
            count,
            amount_cents,
        };
        match status.as_str() {
            "PENDING" => summary.pending = bucket,
            "PROCESSING" => summary.processing = bucket,
            "COLLECTED" => summary.collected = bucket,
            "FAILED" => summary.failed = bucket,
            other => {
                tracing::warn!(status = other, "Unknown collection status in summary");
            }
        }
    }

    summary.booth_rent = booth_rent_rollup(pool, from, to).await?;
    Ok(summary)
}

async fn booth_rent_rollup(pool: &SqlitePool, from: i64, to: i64) -> RepoResult<BoothRentRollup> {
    let now = util::now_millis();
    let row: (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            COALESCE(SUM(CASE WHEN status IN ('PENDING', 'PROCESSING') THEN amount_cents ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'COLLECTED' THEN amount_cents ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'PENDING' AND scheduled_at < ? THEN 1 ELSE 0 END), 0)
         FROM platform_collections
         WHERE collection_type = 'BOOTH_RENT' AND created_at >= ? AND created_at <= ?",
    )
    .bind(now)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(BoothRentRollup {
        due_cents: row.0,
        collected_cents: row.1,
        pending_count: row.2,
        overdue_count: row.3,
    })
}

/// Commission-payment projection for one barber over [from, to].
///
/// `commission_owed_cents` sums the per-transaction-rounded ledger values,
/// so it always agrees with what the calculator and collection records see.
pub async fn barber_revenue(
    pool: &SqlitePool,
    barber_id: i64,
    from: i64,
    to: i64,
) -> RepoResult<BarberRevenue> {
    let row: (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            COALESCE(SUM(t.amount_cents), 0),
            COUNT(t.id),
            COALESCE(SUM(t.commission_cents), 0),
            COALESCE(SUM(CASE WHEN t.commission_collected = 1 THEN t.commission_cents ELSE 0 END), 0)
         FROM external_transactions t
         JOIN processor_connections c ON c.id = t.connection_id
         WHERE c.barber_id = ?
           AND t.status IN ('SUCCEEDED', 'COMPLETED')
           AND t.processed_at >= ? AND t.processed_at <= ?",
    )
    .bind(barber_id)
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(BarberRevenue {
        barber_id,
        period_start: from,
        period_end: to,
        gross_volume_cents: row.0,
        transaction_count: row.1,
        commission_owed_cents: row.2,
        commission_collected_cents: row.3,
        commission_outstanding_cents: row.2 - row.3,
    })
}
