//! Database layer
//!
//! SQLite connection pool (WAL) plus free-function repositories over
//! `&SqlitePool`. Multi-row invariants (status flips + ledger marks) run
//! inside explicit transactions with conditional UPDATEs, so concurrent
//! scheduler ticks and webhook deliveries cannot both finalize a record.

pub mod audit;
pub mod collection_config;
pub mod external_transaction;
pub mod platform_collection;
pub mod reports;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Open the SQLite pool and apply migrations
pub async fn connect(db_path: &str) -> RepoResult<SqlitePool> {
    // Build connection options: WAL, foreign keys, normal sync
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
        .map_err(|e| RepoError::Database(format!("Invalid database path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .pragma("foreign_keys", "ON")
        .optimize_on_close(true, None);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| RepoError::Database(format!("Failed to open database: {e}")))?;

    // busy_timeout: 写冲突时等待 5s 而非立即失败
    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&pool)
        .await
        .map_err(|e| RepoError::Database(format!("Failed to set busy_timeout: {e}")))?;

    tracing::info!("Database connection established (SQLite WAL, busy_timeout=5000ms)");

    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(&pool)
        .await
        .map_err(|e| RepoError::Database(format!("Failed to apply migrations: {e}")))?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
