//! Shared test fixtures: temp-file SQLite databases, seed helpers, and a
//! scriptable mock gateway.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use clipper_collect::collection::CollectionService;
use clipper_collect::db::{self, collection_config, external_transaction};
use clipper_collect::gateway::{
    DebitReceipt, DebitRequest, DebitStatus, GatewayError, GatewayRouter, PaymentGateway,
};
use shared::models::{
    CollectionConfig, CollectionConfigCreate, CollectionFrequency, CollectionMethod,
    ExternalTransaction, ExternalTransactionCreate, PaymentMode, ProcessorConnection,
    ProcessorConnectionCreate, TransactionStatus,
};
use shared::util;

/// Fresh file-backed database (TempDir must outlive the pool)
pub async fn setup_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("clipper-test.db");
    let pool = db::connect(path.to_str().expect("utf8 path"))
        .await
        .expect("open test database");
    (dir, pool)
}

/// Default decentralized ACH config: no minimum, auto-collect on, funding
/// source "bank-{barber_id}"
pub fn config_create(barber_id: i64) -> CollectionConfigCreate {
    CollectionConfigCreate {
        barber_id,
        payment_mode: PaymentMode::Decentralized,
        collection_method: CollectionMethod::Ach,
        collection_frequency: CollectionFrequency::Weekly,
        booth_rent_cents: None,
        minimum_collection_cents: 0,
        auto_collection: true,
        funding_source_ref: Some(format!("bank-{barber_id}")),
        payment_method_ref: None,
    }
}

pub async fn seed_config(pool: &SqlitePool, data: CollectionConfigCreate) -> CollectionConfig {
    collection_config::upsert(pool, data)
        .await
        .expect("seed config")
}

pub async fn seed_connection(pool: &SqlitePool, barber_id: i64) -> ProcessorConnection {
    external_transaction::create_connection(
        pool,
        ProcessorConnectionCreate {
            barber_id,
            processor: "square".into(),
            external_account_ref: Some(format!("acct-{barber_id}")),
        },
    )
    .await
    .expect("seed connection")
}

pub async fn seed_txn(
    pool: &SqlitePool,
    connection_id: i64,
    amount_cents: i64,
    rate_bps: i64,
) -> ExternalTransaction {
    external_transaction::record(
        pool,
        ExternalTransactionCreate {
            connection_id,
            appointment_id: None,
            amount_cents,
            commission_rate_bps: rate_bps,
            processed_at: util::now_millis(),
            status: TransactionStatus::Succeeded,
        },
    )
    .await
    .expect("seed transaction")
}

/// What the mock rail does with a debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// Synchronous success (card-style)
    Settle,
    /// Accepted, webhook closes it later (ACH-style)
    Pending,
    /// Retryable failure (timeout / 5xx)
    Transient,
    /// Terminal decline (NSF)
    Declined,
}

/// Scriptable gateway: per-instrument outcomes plus a default, with a call
/// counter for idempotency assertions.
pub struct MockGateway {
    default: Mutex<MockOutcome>,
    per_instrument: Mutex<HashMap<String, MockOutcome>>,
    calls: AtomicUsize,
}

impl MockGateway {
    pub fn new(default: MockOutcome) -> Arc<Self> {
        Arc::new(Self {
            default: Mutex::new(default),
            per_instrument: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_default(&self, outcome: MockOutcome) {
        *self.default.lock().unwrap() = outcome;
    }

    pub fn set_for(&self, instrument: &str, outcome: MockOutcome) {
        self.per_instrument
            .lock()
            .unwrap()
            .insert(instrument.to_string(), outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn debit(&self, req: &DebitRequest) -> Result<DebitReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .per_instrument
            .lock()
            .unwrap()
            .get(&req.source_instrument)
            .copied()
            .unwrap_or(*self.default.lock().unwrap());

        match outcome {
            MockOutcome::Settle => Ok(DebitReceipt {
                gateway_transaction_id: format!("mock-{}", req.collection_id),
                processing_fee_cents: 25,
                net_amount_cents: req.amount_cents - 25,
                status: DebitStatus::Settled,
            }),
            MockOutcome::Pending => Ok(DebitReceipt {
                gateway_transaction_id: format!("mock-{}", req.collection_id),
                processing_fee_cents: 0,
                net_amount_cents: req.amount_cents,
                status: DebitStatus::Pending,
            }),
            MockOutcome::Transient => {
                Err(GatewayError::Transient("simulated rail timeout".into()))
            }
            MockOutcome::Declined => {
                Err(GatewayError::Declined("simulated insufficient funds".into()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Collection service wired to the mock gateway for both methods
pub fn service_with(pool: &SqlitePool, gateway: Arc<MockGateway>) -> CollectionService {
    CollectionService::new(
        pool.clone(),
        GatewayRouter::new(gateway.clone(), gateway),
    )
}
