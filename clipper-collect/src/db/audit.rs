//! Audit log operations
//!
//! Append-only trail of collection lifecycle events. Writes are best-effort
//! at call sites (`let _ = ...`); the audit trail is a projection, never
//! the critical path.

use super::RepoResult;
use sqlx::SqlitePool;

/// Write an audit log entry
pub async fn log(
    pool: &SqlitePool,
    collection_id: Option<i64>,
    barber_id: Option<i64>,
    action: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO collection_audit_log (collection_id, barber_id, action, detail, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(collection_id)
    .bind(barber_id)
    .bind(action)
    .bind(detail.map(|d| d.to_string()))
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub collection_id: Option<i64>,
    pub barber_id: Option<i64>,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

/// Query audit entries for a collection, newest first
pub async fn for_collection(
    pool: &SqlitePool,
    collection_id: i64,
    limit: i32,
) -> RepoResult<Vec<AuditEntry>> {
    let rows: Vec<AuditEntry> = sqlx::query_as(
        "SELECT id, collection_id, barber_id, action, detail, created_at FROM collection_audit_log WHERE collection_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(collection_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
