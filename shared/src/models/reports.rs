//! Read-only reporting projections
//!
//! Consumed by the financial dashboard; recomputed from the ledger and
//! collection tables, never a source of truth.

use serde::{Deserialize, Serialize};

/// Count + amount rollup for one collection status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatusBucket {
    pub count: i64,
    pub amount_cents: i64,
}

/// Booth-rent rollup for the payout summary
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BoothRentRollup {
    /// PENDING + PROCESSING booth-rent amounts
    pub due_cents: i64,
    pub collected_cents: i64,
    pub pending_count: i64,
    /// PENDING booth-rent records whose scheduled date has passed
    pub overdue_count: i64,
}

/// Platform-wide payout summary over a time window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutSummary {
    pub pending: StatusBucket,
    pub processing: StatusBucket,
    pub collected: StatusBucket,
    pub failed: StatusBucket,
    pub booth_rent: BoothRentRollup,
}

/// Commission-payment style projection for one barber over a period.
///
/// Derived from the external transaction ledger; `commission_owed_cents`
/// is the per-transaction-rounded sum, matching what the calculator and
/// the collection records themselves see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarberRevenue {
    pub barber_id: i64,
    pub period_start: i64,
    pub period_end: i64,
    /// Gross settled volume on the barber's own processor
    pub gross_volume_cents: i64,
    pub transaction_count: i64,
    pub commission_owed_cents: i64,
    pub commission_collected_cents: i64,
    pub commission_outstanding_cents: i64,
}
