//! Payment rail gateway adapters
//!
//! The orchestrator only sees the [`PaymentGateway`] trait: one `debit`
//! call with a stable idempotency key. Concrete adapters drive the rail
//! REST APIs directly with reqwest (no vendor SDK). Which adapter runs is
//! decided by configuration at the composition root; there is no silent
//! mock fallback inside the live adapters.

pub mod ach;
pub mod card;
pub mod null;

pub use ach::AchGateway;
pub use card::CardGateway;
pub use null::NullGateway;

use async_trait::async_trait;
use shared::models::CollectionMethod;
use std::sync::Arc;
use thiserror::Error;

/// One debit instruction against the rail
#[derive(Debug, Clone)]
pub struct DebitRequest {
    pub collection_id: i64,
    /// Stable across retries of the same collection. The rail's own
    /// idempotency support guarantees a re-sent debit never executes twice
    pub idempotency_key: String,
    /// The barber's stored instrument (funding source or card reference)
    pub source_instrument: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// How far the rail got with the debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitStatus {
    /// Money moved synchronously (card)
    Settled,
    /// Rail accepted the transfer; a webhook will report the final status
    /// (ACH settlement is asynchronous)
    Pending,
}

#[derive(Debug, Clone)]
pub struct DebitReceipt {
    /// Rail-side transfer reference, stable for webhook correlation
    pub gateway_transaction_id: String,
    pub processing_fee_cents: i64,
    pub net_amount_cents: i64,
    pub status: DebitStatus,
}

/// Gateway failure, tagged by retryability
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Timeout, rail-side 5xx, rate limiting. Safe to retry with backoff.
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// The rail refused the debit (insufficient funds, closed account).
    /// Retrying without operator action will not help.
    #[error("debit declined: {0}")]
    Declined(String),

    /// The stored instrument reference is unusable: configuration problem
    #[error("invalid funding instrument: {0}")]
    InvalidInstrument(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Execute one debit. Implementations MUST honor the request's
    /// idempotency key on the rail.
    async fn debit(&self, req: &DebitRequest) -> Result<DebitReceipt, GatewayError>;

    /// Adapter name for logs
    fn name(&self) -> &'static str;
}

/// Dispatches a collection to the adapter for its configured method
#[derive(Clone)]
pub struct GatewayRouter {
    ach: Arc<dyn PaymentGateway>,
    card: Arc<dyn PaymentGateway>,
}

impl GatewayRouter {
    pub fn new(ach: Arc<dyn PaymentGateway>, card: Arc<dyn PaymentGateway>) -> Self {
        Self { ach, card }
    }

    /// Both methods wired to the explicit no-op gateway (development/tests)
    pub fn null() -> Self {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(NullGateway::default());
        Self {
            ach: gateway.clone(),
            card: gateway,
        }
    }

    pub fn for_method(&self, method: CollectionMethod) -> &Arc<dyn PaymentGateway> {
        match method {
            CollectionMethod::Ach => &self.ach,
            CollectionMethod::Card => &self.card,
        }
    }
}
