//! Collection engine
//!
//! - [`calculator`]: pure reads (outstanding commission, booth rent due)
//! - [`orchestrator`]: the state machine: creation, scheduled attempts,
//!   retries, webhook reconciliation
//! - [`error`]: tagged error kinds (retryable vs. terminal)

pub mod calculator;
pub mod error;
pub mod orchestrator;

pub use calculator::{BoothRentDue, OutstandingCommission};
pub use error::{CollectionError, CollectionResult};
pub use orchestrator::{CollectionRunResult, CollectionService, RailStatus, ReconcileOutcome};
