//! Explicit no-op gateway
//!
//! Selected via configuration (GATEWAY_MODE=mock) for development and
//! tests. Every debit "settles" instantly with a synthetic reference and
//! zero fees. This is the only non-live gateway in the tree; the live
//! adapters never fall back to mock behavior on their own.

use super::{DebitReceipt, DebitRequest, DebitStatus, GatewayError, PaymentGateway};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct NullGateway;

#[async_trait]
impl PaymentGateway for NullGateway {
    async fn debit(&self, req: &DebitRequest) -> Result<DebitReceipt, GatewayError> {
        tracing::debug!(
            collection_id = req.collection_id,
            amount_cents = req.amount_cents,
            "NullGateway debit (no money moved)"
        );
        Ok(DebitReceipt {
            gateway_transaction_id: format!("null-{}", req.collection_id),
            processing_fee_cents: 0,
            net_amount_cents: req.amount_cents,
            status: DebitStatus::Settled,
        })
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
