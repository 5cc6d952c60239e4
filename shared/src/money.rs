//! Money arithmetic in integer minor units (USD cents)
//!
//! All stored amounts are i64 cents; commission rates are basis points
//! (1 bps = 0.01%). `Decimal` is used only transiently when a rate or
//! proration has to be applied, then rounded back to whole cents. Summation
//! over the ledger stays in integer cents, so large batches cannot
//! accumulate binary-float rounding drift.

use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Basis-point denominator (10_000 bps = 100%)
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Convert cents to a Decimal dollar amount
#[inline]
pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, DECIMAL_PLACES)
}

/// Convert a Decimal dollar amount back to whole cents, half-away-from-zero
#[inline]
pub fn decimal_to_cents(value: Decimal) -> i64 {
    let cents = (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    // SAFETY: rounded to 0dp; ledger amounts are bounded far below i64::MAX
    cents.to_i64().expect("cent amount out of i64 range")
}

/// Per-transaction commission: amount × rate, rounded to a whole cent.
///
/// Rounding happens here, per transaction, never once over a batch total.
#[inline]
pub fn commission_cents(amount_cents: i64, rate_bps: i64) -> i64 {
    let commission = Decimal::from(amount_cents) * Decimal::from(rate_bps)
        / Decimal::from(BPS_DENOMINATOR);
    let rounded = commission.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    // SAFETY: product of two bounded i64 ledger values divided by 10_000
    rounded.to_i64().expect("commission out of i64 range")
}

/// Prorate a base amount by numerator/denominator (e.g. rent × days / 7),
/// rounded to a whole cent.
#[inline]
pub fn prorate_cents(base_cents: i64, numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    let prorated =
        Decimal::from(base_cents) * Decimal::from(numerator) / Decimal::from(denominator);
    let rounded = prorated.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64().expect("prorated amount out of i64 range")
}

/// Format cents as a USD string for descriptions and log messages
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}
