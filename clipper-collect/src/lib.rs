//! Clipper Collect — platform commission & booth-rent collection engine
//!
//! # 架构概述
//!
//! Collects platform commission and booth rent from decentralized-payment
//! barbers: computes what is owed from the external transaction ledger,
//! debits it over the configured rail, and keeps the ledger consistent
//! under retries and webhook-driven eventual confirmation.
//!
//! # Module structure
//!
//! ```text
//! clipper-collect/src/
//! ├── config.rs      # Env-driven configuration
//! ├── state.rs       # Composition root (pool + gateways)
//! ├── db/            # SQLite repositories (ledger, configs, collections)
//! ├── collection/    # Calculators + orchestrator state machine
//! ├── gateway/       # Payment rail adapters (ACH, card, null)
//! ├── worker.rs      # Background scheduler loop
//! └── logger.rs      # Tracing setup
//! ```

pub mod collection;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logger;
pub mod state;
pub mod worker;

// Re-export 公共类型
pub use collection::{
    CollectionError, CollectionResult, CollectionRunResult, CollectionService, RailStatus,
    ReconcileOutcome,
};
pub use config::Config;
pub use state::AppState;
