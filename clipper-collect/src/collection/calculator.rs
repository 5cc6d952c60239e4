//! Commission and booth-rent calculators
//!
//! Pure reads over the ledger; nothing here mutates state. "No eligible
//! data" is a zero result, not an error; only a missing barber config is
//! an error.

use super::error::{CollectionError, CollectionResult};
use crate::db::{collection_config, external_transaction, platform_collection};
use shared::models::{CollectionConfig, ExternalTransaction};
use shared::{money, util};
use sqlx::SqlitePool;

/// Window start fallback when the barber has never been collected from
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

const DAY_MS: i64 = 86_400_000;

/// Outstanding commission owed by one barber over a window
#[derive(Debug, Clone)]
pub struct OutstandingCommission {
    pub barber_id: i64,
    pub period_start: i64,
    pub period_end: i64,
    /// Σ of per-transaction-rounded commission amounts. Integer cents:
    /// the sum carries no float drift regardless of batch size.
    pub total_owed_cents: i64,
    pub transaction_count: usize,
    pub transactions: Vec<ExternalTransaction>,
    pub meets_minimum_threshold: bool,
}

impl OutstandingCommission {
    pub fn transaction_ids(&self) -> Vec<i64> {
        self.transactions.iter().map(|t| t.id).collect()
    }
}

/// Booth rent due for one barber over a period
#[derive(Debug, Clone)]
pub struct BoothRentDue {
    pub barber_id: i64,
    pub amount_cents: i64,
    /// False when the barber has no booth rent configured (amount is 0)
    pub configured: bool,
    pub already_collected: bool,
    pub existing_collection_id: Option<i64>,
    pub period_days: i64,
}

/// Compute the commission a barber currently owes.
///
/// The window start defaults to the barber's last COLLECTED commission
/// collection, else now − 30 days; the end defaults to now. Selects only
/// settled, uncollected ledger rows inside the window.
pub async fn calculate_outstanding_commission(
    pool: &SqlitePool,
    barber_id: i64,
    start_millis: Option<i64>,
    end_millis: Option<i64>,
) -> CollectionResult<OutstandingCommission> {
    let config = require_config(pool, barber_id).await?;

    let period_end = end_millis.unwrap_or_else(util::now_millis);
    let period_start = match start_millis {
        Some(start) => start,
        None => match platform_collection::last_collected_commission_at(pool, barber_id).await? {
            Some(collected_at) => collected_at,
            None => period_end - DEFAULT_LOOKBACK_DAYS * DAY_MS,
        },
    };

    let transactions =
        external_transaction::find_uncollected(pool, barber_id, period_start, period_end).await?;

    let total_owed_cents: i64 = transactions.iter().map(|t| t.commission_cents).sum();

    Ok(OutstandingCommission {
        barber_id,
        period_start,
        period_end,
        total_owed_cents,
        transaction_count: transactions.len(),
        meets_minimum_threshold: total_owed_cents >= config.minimum_collection_cents,
        transactions,
    })
}

/// Compute booth rent due for [period_start, period_end].
///
/// Proration is calendar-day counting against a fixed divisor per
/// frequency (7 / 30 / 1), deliberately inherited behavior; see
/// DESIGN.md for the month-length caveat.
pub async fn calculate_booth_rent(
    pool: &SqlitePool,
    barber_id: i64,
    period_start: i64,
    period_end: i64,
) -> CollectionResult<BoothRentDue> {
    if period_end <= period_start {
        return Err(CollectionError::Validation(format!(
            "period_end ({period_end}) must be after period_start ({period_start})"
        )));
    }

    let config = require_config(pool, barber_id).await?;

    let Some(rent_cents) = config.booth_rent_cents else {
        return Ok(BoothRentDue {
            barber_id,
            amount_cents: 0,
            configured: false,
            already_collected: false,
            existing_collection_id: None,
            period_days: 0,
        });
    };

    let period_days = (period_end - period_start) / DAY_MS;
    let amount_cents = money::prorate_cents(
        rent_cents,
        period_days,
        config.collection_frequency.period_days(),
    );

    let existing =
        platform_collection::booth_rent_covering(pool, barber_id, period_start, period_end).await?;

    Ok(BoothRentDue {
        barber_id,
        amount_cents,
        configured: true,
        already_collected: existing.is_some(),
        existing_collection_id: existing.map(|c| c.id),
        period_days,
    })
}

async fn require_config(pool: &SqlitePool, barber_id: i64) -> CollectionResult<CollectionConfig> {
    collection_config::find_by_barber(pool, barber_id)
        .await?
        .ok_or_else(|| {
            CollectionError::NotFound(format!("collection config for barber {barber_id}"))
        })
}
