//! Per-barber collection policy
//!
//! Exactly one active config per barber (PRIMARY KEY barber_id). Created at
//! onboarding, updated by the barber or an admin, read-only to the
//! collection orchestrator.

use serde::{Deserialize, Serialize};

/// How the barber's revenue is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PaymentMode {
    /// Barber charges through their own processor; commission is collected
    /// after the fact by this engine
    Decentralized,
    /// Platform processes payments and takes commission at charge time
    Platform,
}

/// Rail used to pull money from the barber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CollectionMethod {
    Ach,
    Card,
}

impl CollectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ach => "ACH",
            Self::Card => "CARD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CollectionFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl CollectionFrequency {
    /// Divisor for booth-rent proration (calendar days per period).
    /// Monthly uses a flat 30 (inherited source behavior, see DESIGN.md).
    pub fn period_days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

/// Collection policy row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CollectionConfig {
    pub barber_id: i64,
    pub payment_mode: PaymentMode,
    pub collection_method: CollectionMethod,
    pub collection_frequency: CollectionFrequency,
    /// Fixed periodic booth rent (cents); None when not configured
    pub booth_rent_cents: Option<i64>,
    /// Commission collections below this are skipped (cents)
    pub minimum_collection_cents: i64,
    /// Whether the engine may debit without manual approval
    pub auto_collection: bool,
    /// Gateway reference to the barber's bank funding source (ACH)
    pub funding_source_ref: Option<String>,
    /// Gateway reference to the barber's stored card (CARD)
    pub payment_method_ref: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CollectionConfig {
    /// The stored instrument for a collection method, if configured
    pub fn instrument_for(&self, method: CollectionMethod) -> Option<&str> {
        match method {
            CollectionMethod::Ach => self.funding_source_ref.as_deref(),
            CollectionMethod::Card => self.payment_method_ref.as_deref(),
        }
    }
}

/// Create/replace payload (timestamps assigned by the repository)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfigCreate {
    pub barber_id: i64,
    pub payment_mode: PaymentMode,
    pub collection_method: CollectionMethod,
    pub collection_frequency: CollectionFrequency,
    pub booth_rent_cents: Option<i64>,
    pub minimum_collection_cents: i64,
    pub auto_collection: bool,
    pub funding_source_ref: Option<String>,
    pub payment_method_ref: Option<String>,
}
