//! Data models
//!
//! Shared between the collection engine and reporting consumers.
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), all amounts are i64
//! cents, all timestamps are Unix millis.

pub mod collection_config;
pub mod external_transaction;
pub mod platform_collection;
pub mod reports;

// Re-exports
pub use collection_config::*;
pub use external_transaction::*;
pub use platform_collection::*;
pub use reports::*;
