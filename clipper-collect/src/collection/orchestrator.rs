//! Collection orchestrator
//!
//! Owns every write to `platform_collections` and the ledger's collected
//! mark. State machine: PENDING → PROCESSING → {COLLECTED | FAILED}, with
//! FAILED → PENDING re-entry scheduled by the backoff policy while the
//! attempt budget lasts. Batch entry points return structured per-item
//! results so one barber's decline never aborts the run.

use super::calculator;
use super::error::{CollectionError, CollectionResult};
use crate::db::{audit, collection_config, platform_collection};
use crate::gateway::{DebitReceipt, DebitRequest, DebitStatus, GatewayRouter, PaymentGateway};
use shared::models::{
    CollectionConfig, CollectionStatus, CollectionType, NewCollection, PlatformCollection,
};
use shared::{money, util};
use sqlx::SqlitePool;

const HOUR_MS: i64 = 3_600_000;
/// Backoff exponent cap (2^6 = 64h) for records with a raised retry budget
const BACKOFF_MAX_EXPONENT: i64 = 6;

/// Delay before the next attempt after `attempts_made` failed attempts:
/// 1h, 2h, 4h, ... (the default budget of 3 exhausts after 1h + 2h)
fn backoff_delay_ms(attempts_made: i64) -> i64 {
    let exp = (attempts_made - 1).clamp(0, BACKOFF_MAX_EXPONENT) as u32;
    HOUR_MS << exp
}

/// Per-item outcome of a collection attempt
#[derive(Debug, Clone)]
pub struct CollectionRunResult {
    pub collection_id: i64,
    pub barber_id: i64,
    pub amount_cents: i64,
    pub status: CollectionStatus,
    pub success: bool,
    pub message: String,
}

impl CollectionRunResult {
    fn of(row: &PlatformCollection, success: bool, message: impl Into<String>) -> Self {
        Self {
            collection_id: row.id,
            barber_id: row.barber_id,
            amount_cents: row.amount_cents,
            status: row.status,
            success,
            message: message.into(),
        }
    }

    fn with_status(mut self, status: CollectionStatus) -> Self {
        self.status = status;
        self
    }
}

/// Final transfer status delivered by the rail's webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailStatus {
    Completed,
    Failed,
}

impl RailStatus {
    /// Map rail-side status strings onto the two terminal outcomes
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processed" | "completed" | "succeeded" => Some(Self::Completed),
            "failed" | "cancelled" | "returned" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What a webhook delivery ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Record finalized COLLECTED, ledger rows marked
    Collected,
    /// Failure recorded, another attempt scheduled
    RetryScheduled,
    /// Failure recorded, attempt budget exhausted
    Failed,
    /// Record already terminal (duplicate delivery, no-op)
    AlreadyFinal,
    /// No record carries this rail reference
    Unknown,
}

/// The collection engine. Explicitly constructed with its pool and gateway
/// router at the composition root; cheap to clone.
#[derive(Clone)]
pub struct CollectionService {
    pool: SqlitePool,
    gateways: GatewayRouter,
}

impl CollectionService {
    pub fn new(pool: SqlitePool, gateways: GatewayRouter) -> Self {
        Self { pool, gateways }
    }

    /// Create a PENDING collection for a barber.
    ///
    /// With `auto_collect` (and the barber's config allowing it) one debit
    /// attempt runs synchronously; an attempt failure is logged and left
    /// to the scheduler's retry machinery, and never fails the creation.
    pub async fn create_collection(
        &self,
        req: NewCollection,
    ) -> CollectionResult<PlatformCollection> {
        if req.amount_cents <= 0 {
            return Err(CollectionError::Validation(format!(
                "collection amount must be positive, got {}",
                req.amount_cents
            )));
        }

        let config = self.require_config(req.barber_id).await?;

        let created =
            platform_collection::create(&self.pool, &req, config.collection_method).await?;

        tracing::info!(
            collection_id = created.id,
            barber_id = created.barber_id,
            collection_type = created.collection_type.as_str(),
            amount = %money::format_usd(created.amount_cents),
            "Collection created"
        );
        let detail = serde_json::json!({
            "type": created.collection_type.as_str(),
            "amount_cents": created.amount_cents,
            "transactions": req.related_transaction_ids.len(),
        });
        let _ = audit::log(
            &self.pool,
            Some(created.id),
            Some(created.barber_id),
            "collection_created",
            Some(&detail),
            util::now_millis(),
        )
        .await;

        if req.auto_collect && config.auto_collection {
            let result = self.attempt_collection(created.id).await;
            if !result.success {
                tracing::warn!(
                    collection_id = created.id,
                    message = %result.message,
                    "Auto-collect attempt did not complete"
                );
            }
            // Return the post-attempt state
            return platform_collection::find_by_id(&self.pool, created.id)
                .await?
                .ok_or_else(|| {
                    CollectionError::Database(format!("collection {} vanished", created.id))
                });
        }

        Ok(created)
    }

    /// Run every due PENDING collection, oldest first. Per-item failures
    /// are isolated; the batch always runs to completion.
    pub async fn process_scheduled_collections(
        &self,
        limit: i64,
    ) -> CollectionResult<Vec<CollectionRunResult>> {
        let now = util::now_millis();
        let due = platform_collection::find_due(&self.pool, now, limit).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(count = due.len(), "Processing due collections");

        let mut results = Vec::with_capacity(due.len());
        for row in due {
            let result = self.attempt_collection(row.id).await;
            if !result.success {
                tracing::warn!(
                    collection_id = result.collection_id,
                    barber_id = result.barber_id,
                    message = %result.message,
                    "Collection attempt failed"
                );
            }
            results.push(result);
        }
        Ok(results)
    }

    /// Manual re-trigger for a FAILED (or still-PENDING) collection.
    pub async fn retry_failed_collection(&self, id: i64) -> CollectionResult<CollectionRunResult> {
        let row = platform_collection::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| CollectionError::NotFound(format!("collection {id}")))?;

        match row.status {
            CollectionStatus::Failed | CollectionStatus::Pending => {}
            other => {
                return Err(CollectionError::InvalidState(format!(
                    "collection {id} is {}, only FAILED or PENDING can be retried",
                    other.as_str()
                )));
            }
        }
        if row.retries_exhausted() {
            return Err(CollectionError::RetryLimitExceeded(id));
        }

        // A FAILED collection released its ledger rows; they may have been
        // claimed by a newer collection since. Re-check before re-debiting.
        if row.status == CollectionStatus::Failed {
            let txn_ids = platform_collection::transaction_ids(&self.pool, id).await?;
            if !txn_ids.is_empty() {
                let mut tx = self.pool.begin().await.map_err(crate::db::RepoError::from)?;
                platform_collection::guard_transactions_available(&mut tx, row.barber_id, &txn_ids)
                    .await?;
                tx.rollback().await.map_err(crate::db::RepoError::from)?;
            }
        }

        let _ = audit::log(
            &self.pool,
            Some(id),
            Some(row.barber_id),
            "collection_manual_retry",
            None,
            util::now_millis(),
        )
        .await;

        Ok(self.attempt_collection(id).await)
    }

    /// Create commission collections for one or all decentralized-mode
    /// barbers. Below-threshold barbers are skipped, never errored; a
    /// per-barber failure is logged and does not stop the sweep.
    pub async fn generate_commission_collections(
        &self,
        barber_id: Option<i64>,
    ) -> CollectionResult<Vec<PlatformCollection>> {
        let configs = match barber_id {
            Some(id) => vec![self.require_config(id).await?],
            None => collection_config::list_decentralized(&self.pool).await?,
        };

        let mut created = Vec::new();
        for config in configs {
            if !matches!(config.payment_mode, shared::models::PaymentMode::Decentralized) {
                tracing::debug!(
                    barber_id = config.barber_id,
                    "Skipping platform-mode barber for commission generation"
                );
                continue;
            }
            match self.generate_for_barber(&config).await {
                Ok(Some(collection)) => created.push(collection),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        barber_id = config.barber_id,
                        error = %e,
                        "Commission generation failed for barber"
                    );
                }
            }
        }

        tracing::info!(created = created.len(), "Commission generation sweep complete");
        Ok(created)
    }

    async fn generate_for_barber(
        &self,
        config: &CollectionConfig,
    ) -> CollectionResult<Option<PlatformCollection>> {
        let outstanding = calculator::calculate_outstanding_commission(
            &self.pool,
            config.barber_id,
            None,
            None,
        )
        .await?;

        if outstanding.transaction_count == 0 {
            return Ok(None);
        }
        if !outstanding.meets_minimum_threshold {
            tracing::debug!(
                barber_id = config.barber_id,
                owed = %money::format_usd(outstanding.total_owed_cents),
                minimum = %money::format_usd(config.minimum_collection_cents),
                "Outstanding commission below minimum, skipping"
            );
            return Ok(None);
        }

        let description = format!(
            "Commission on {} transactions, {}",
            outstanding.transaction_count,
            money::format_usd(outstanding.total_owed_cents)
        );
        let req = NewCollection {
            barber_id: config.barber_id,
            collection_type: CollectionType::Commission,
            amount_cents: outstanding.total_owed_cents,
            description: Some(description),
            period_start: Some(outstanding.period_start),
            period_end: Some(outstanding.period_end),
            related_transaction_ids: outstanding.transaction_ids(),
            auto_collect: true,
        };

        match self.create_collection(req).await {
            Ok(collection) => Ok(Some(collection)),
            // An open collection already claims some of these rows: a
            // previous sweep's record is still in flight. Nothing to do.
            Err(CollectionError::Conflict(msg)) => {
                tracing::debug!(barber_id = config.barber_id, "Generation skipped: {msg}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Webhook entry point: apply the rail's final transfer status.
    /// Idempotent: duplicate deliveries and already-finalized records are
    /// no-ops, not errors.
    pub async fn reconcile_transfer_status(
        &self,
        gateway_transaction_id: &str,
        final_status: RailStatus,
    ) -> CollectionResult<ReconcileOutcome> {
        let Some(row) =
            platform_collection::find_by_gateway_txn(&self.pool, gateway_transaction_id).await?
        else {
            tracing::warn!(
                gateway_transaction_id,
                "Webhook for unknown transfer reference"
            );
            return Ok(ReconcileOutcome::Unknown);
        };

        if row.status != CollectionStatus::Processing {
            tracing::debug!(
                collection_id = row.id,
                status = row.status.as_str(),
                "Duplicate webhook for finalized collection, skipping"
            );
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        let now = util::now_millis();
        match final_status {
            RailStatus::Completed => {
                let finalized =
                    platform_collection::finalize_collected(&self.pool, row.id, None, None, None, now)
                        .await?;
                if !finalized {
                    return Ok(ReconcileOutcome::AlreadyFinal);
                }
                tracing::info!(
                    collection_id = row.id,
                    barber_id = row.barber_id,
                    amount = %money::format_usd(row.amount_cents),
                    "Collection finalized by rail webhook"
                );
                let _ = audit::log(
                    &self.pool,
                    Some(row.id),
                    Some(row.barber_id),
                    "collection_collected",
                    None,
                    now,
                )
                .await;
                Ok(ReconcileOutcome::Collected)
            }
            RailStatus::Failed => {
                let reschedule = if row.retry_count < row.max_retries {
                    Some(now + backoff_delay_ms(row.retry_count))
                } else {
                    None
                };
                let applied = platform_collection::finalize_failed(
                    &self.pool,
                    row.id,
                    "rail reported transfer failure",
                    reschedule,
                    now,
                )
                .await?;
                if !applied {
                    return Ok(ReconcileOutcome::AlreadyFinal);
                }
                let _ = audit::log(
                    &self.pool,
                    Some(row.id),
                    Some(row.barber_id),
                    "collection_failed",
                    None,
                    now,
                )
                .await;
                match reschedule {
                    Some(when) => {
                        tracing::warn!(
                            collection_id = row.id,
                            retry_at = when,
                            "Transfer failed on rail, retry scheduled"
                        );
                        Ok(ReconcileOutcome::RetryScheduled)
                    }
                    None => {
                        tracing::error!(
                            collection_id = row.id,
                            barber_id = row.barber_id,
                            "Transfer failed on rail, retries exhausted, needs attention"
                        );
                        Ok(ReconcileOutcome::Failed)
                    }
                }
            }
        }
    }

    /// One debit attempt against the configured rail. Always returns a
    /// structured result; internal errors never propagate as panics or
    /// batch-aborting Errs.
    pub async fn attempt_collection(&self, id: i64) -> CollectionRunResult {
        let row = match platform_collection::find_by_id(&self.pool, id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                return CollectionRunResult {
                    collection_id: id,
                    barber_id: 0,
                    amount_cents: 0,
                    status: CollectionStatus::Failed,
                    success: false,
                    message: format!("collection {id} not found"),
                };
            }
            Err(e) => {
                return CollectionRunResult {
                    collection_id: id,
                    barber_id: 0,
                    amount_cents: 0,
                    status: CollectionStatus::Failed,
                    success: false,
                    message: format!("database error: {e}"),
                };
            }
        };

        let now = util::now_millis();
        let claimed = match platform_collection::begin_attempt(&self.pool, id, now).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                // Wrong state, retries exhausted, or a concurrent claimer won
                return CollectionRunResult::of(
                    &row,
                    false,
                    format!(
                        "collection {} not claimable (status {}, {}/{} attempts)",
                        id,
                        row.status.as_str(),
                        row.retry_count,
                        row.max_retries
                    ),
                );
            }
            Err(e) => {
                return CollectionRunResult::of(&row, false, format!("database error: {e}"));
            }
        };

        let config = match collection_config::find_by_barber(&self.pool, claimed.barber_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                return self
                    .handle_failure(
                        &claimed,
                        CollectionError::Validation(format!(
                            "no collection config for barber {}",
                            claimed.barber_id
                        )),
                    )
                    .await;
            }
            Err(e) => {
                return CollectionRunResult::of(&claimed, false, format!("database error: {e}"));
            }
        };

        let Some(instrument) = config.instrument_for(claimed.collection_method) else {
            return self
                .handle_failure(
                    &claimed,
                    CollectionError::Validation(format!(
                        "no {} instrument configured for barber {}",
                        claimed.collection_method.as_str(),
                        claimed.barber_id
                    )),
                )
                .await;
        };

        let request = DebitRequest {
            collection_id: claimed.id,
            idempotency_key: claimed.idempotency_key(),
            source_instrument: instrument.to_string(),
            amount_cents: claimed.amount_cents,
            currency: claimed.currency.clone(),
        };

        let gateway = self.gateways.for_method(claimed.collection_method);
        tracing::debug!(
            collection_id = claimed.id,
            gateway = gateway.name(),
            attempt = claimed.retry_count,
            "Dispatching debit"
        );

        match gateway.debit(&request).await {
            Ok(receipt) => match receipt.status {
                DebitStatus::Settled => self.finalize_success(&claimed, &receipt).await,
                DebitStatus::Pending => self.record_acceptance(&claimed, &receipt).await,
            },
            Err(e) => self.handle_failure(&claimed, e.into()).await,
        }
    }

    async fn finalize_success(
        &self,
        row: &PlatformCollection,
        receipt: &DebitReceipt,
    ) -> CollectionRunResult {
        let now = util::now_millis();
        match platform_collection::finalize_collected(
            &self.pool,
            row.id,
            Some(&receipt.gateway_transaction_id),
            Some(receipt.processing_fee_cents),
            Some(receipt.net_amount_cents),
            now,
        )
        .await
        {
            Ok(true) => {
                tracing::info!(
                    collection_id = row.id,
                    barber_id = row.barber_id,
                    amount = %money::format_usd(row.amount_cents),
                    gateway_transaction_id = %receipt.gateway_transaction_id,
                    "Collection collected"
                );
                let _ = audit::log(
                    &self.pool,
                    Some(row.id),
                    Some(row.barber_id),
                    "collection_collected",
                    None,
                    now,
                )
                .await;
                CollectionRunResult::of(row, true, "collected")
                    .with_status(CollectionStatus::Collected)
            }
            // A concurrent webhook finalized first; money moved exactly once
            Ok(false) => CollectionRunResult::of(row, true, "already finalized")
                .with_status(CollectionStatus::Collected),
            Err(e) => CollectionRunResult::of(row, false, format!("database error: {e}")),
        }
    }

    async fn record_acceptance(
        &self,
        row: &PlatformCollection,
        receipt: &DebitReceipt,
    ) -> CollectionRunResult {
        let now = util::now_millis();
        match platform_collection::record_gateway_acceptance(
            &self.pool,
            row.id,
            &receipt.gateway_transaction_id,
            receipt.processing_fee_cents,
            receipt.net_amount_cents,
            now,
        )
        .await
        {
            Ok(_) => {
                tracing::info!(
                    collection_id = row.id,
                    gateway_transaction_id = %receipt.gateway_transaction_id,
                    "Debit accepted by rail, awaiting confirmation"
                );
                CollectionRunResult::of(row, true, "debit accepted, awaiting rail confirmation")
                    .with_status(CollectionStatus::Processing)
            }
            Err(e) => CollectionRunResult::of(row, false, format!("database error: {e}")),
        }
    }

    async fn handle_failure(
        &self,
        row: &PlatformCollection,
        err: CollectionError,
    ) -> CollectionRunResult {
        let now = util::now_millis();
        // row.retry_count already counts this attempt
        let reschedule = if err.is_retryable() && row.retry_count < row.max_retries {
            Some(now + backoff_delay_ms(row.retry_count))
        } else {
            None
        };

        let reason = err.to_string();
        if let Err(db_err) =
            platform_collection::finalize_failed(&self.pool, row.id, &reason, reschedule, now).await
        {
            return CollectionRunResult::of(row, false, format!("database error: {db_err}"));
        }

        let _ = audit::log(
            &self.pool,
            Some(row.id),
            Some(row.barber_id),
            if reschedule.is_some() {
                "collection_retry_scheduled"
            } else {
                "collection_failed"
            },
            None,
            now,
        )
        .await;

        match reschedule {
            Some(when) => {
                tracing::warn!(
                    collection_id = row.id,
                    attempt = row.retry_count,
                    max_retries = row.max_retries,
                    retry_at = when,
                    error = %reason,
                    "Collection attempt failed, retry scheduled"
                );
                CollectionRunResult::of(row, false, reason).with_status(CollectionStatus::Pending)
            }
            None => {
                tracing::error!(
                    collection_id = row.id,
                    barber_id = row.barber_id,
                    error = %reason,
                    "Collection failed terminally, needs attention"
                );
                CollectionRunResult::of(row, false, reason).with_status(CollectionStatus::Failed)
            }
        }
    }

    async fn require_config(&self, barber_id: i64) -> CollectionResult<CollectionConfig> {
        collection_config::find_by_barber(&self.pool, barber_id)
            .await?
            .ok_or_else(|| {
                CollectionError::NotFound(format!("collection config for barber {barber_id}"))
            })
    }
}
