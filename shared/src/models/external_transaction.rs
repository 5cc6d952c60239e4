//! External transaction ledger model
//!
//! One row per charge a barber processed through their own processor
//! connection. Append-only: rows are created when the processor reports a
//! completed charge and mutated only when a collection finalizes
//! (`commission_collected` flips once, never back).

use serde::{Deserialize, Serialize};

/// Settlement status reported by the barber's own processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransactionStatus {
    Succeeded,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Whether the charge settled and is commission-eligible
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Completed)
    }
}

/// A barber's link to their own external payment processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProcessorConnection {
    pub id: i64,
    pub barber_id: i64,
    /// Processor name ("square", "stripe", ...)
    pub processor: String,
    /// Processor-side account reference (opaque)
    pub external_account_ref: Option<String>,
    pub created_at: i64,
}

/// Create payload for a processor connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConnectionCreate {
    pub barber_id: i64,
    pub processor: String,
    pub external_account_ref: Option<String>,
}

/// Ledger entry for one externally-processed charge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ExternalTransaction {
    pub id: i64,
    /// Owning processor connection
    pub connection_id: i64,
    pub appointment_id: Option<i64>,
    /// Gross charge amount (cents)
    pub amount_cents: i64,
    /// Commission rate in basis points (0..=10000)
    pub commission_rate_bps: i64,
    /// amount × rate, rounded to a cent at write time; never recomputed
    pub commission_cents: i64,
    /// When the processor settled the charge (millis)
    pub processed_at: i64,
    pub status: TransactionStatus,
    /// Flips false→true exactly once, inside the transaction that
    /// finalizes a COLLECTED platform collection referencing this row
    pub commission_collected: bool,
    pub commission_collected_at: Option<i64>,
    pub created_at: i64,
}

/// Create payload for a ledger entry (commission_cents derived at insert)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTransactionCreate {
    pub connection_id: i64,
    pub appointment_id: Option<i64>,
    pub amount_cents: i64,
    pub commission_rate_bps: i64,
    pub processed_at: i64,
    pub status: TransactionStatus,
}
