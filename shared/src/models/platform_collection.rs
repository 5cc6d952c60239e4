//! Platform collection record
//!
//! One row per attempt/record of pulling money (commission or booth rent)
//! from a barber. Status machine: PENDING → PROCESSING → {COLLECTED |
//! FAILED}; FAILED → PENDING only as a scheduled-retry re-entry while
//! retry_count < max_retries. COLLECTED rows are immutable.

use serde::{Deserialize, Serialize};

use super::collection_config::CollectionMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CollectionType {
    Commission,
    BoothRent,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commission => "COMMISSION",
            Self::BoothRent => "BOOTH_RENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CollectionStatus {
    Pending,
    Processing,
    Collected,
    Failed,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Collected => "COLLECTED",
            Self::Failed => "FAILED",
        }
    }
}

/// A single money-collection record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PlatformCollection {
    pub id: i64,
    pub barber_id: i64,
    pub collection_type: CollectionType,
    pub amount_cents: i64,
    pub currency: String,
    pub status: CollectionStatus,
    pub collection_method: CollectionMethod,
    pub description: Option<String>,
    /// When the record becomes due for an attempt (millis); pushed forward
    /// on each retry by the backoff policy
    pub scheduled_at: i64,
    pub attempted_at: Option<i64>,
    pub collected_at: Option<i64>,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    /// Rail-side transfer reference, set once the gateway accepts the debit
    pub gateway_transaction_id: Option<String>,
    pub processing_fee_cents: Option<i64>,
    pub net_amount_cents: Option<i64>,
    pub failure_reason: Option<String>,
    /// Attempts made so far (typed fields, not a JSON blob)
    pub retry_count: i64,
    pub max_retries: i64,
    pub last_attempt_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlatformCollection {
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Stable idempotency key passed to the payment rail. Derived from the
    /// record id so a re-attempt of a debit that already executed on the
    /// rail cannot double-debit.
    pub fn idempotency_key(&self) -> String {
        format!("clipper-collect-{}", self.id)
    }
}

/// Create payload for a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCollection {
    pub barber_id: i64,
    pub collection_type: CollectionType,
    pub amount_cents: i64,
    pub description: Option<String>,
    /// Billing period covered (booth rent / commission window)
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    /// Ledger entries this collection settles; scoped so the finalize step
    /// marks exactly these rows collected
    pub related_transaction_ids: Vec<i64>,
    /// Attempt the debit synchronously right after creation (still gated
    /// on config.auto_collection)
    pub auto_collect: bool,
}
