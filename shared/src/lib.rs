//! Shared types for the Clipper platform
//!
//! Common types used across the collection engine: ledger and collection
//! models, minor-unit money arithmetic, and ID/time utilities.

pub mod models;
pub mod money;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
