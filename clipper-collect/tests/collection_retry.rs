//! Retry machinery: backoff scheduling, attempt budgets, batch isolation,
//! and terminal validation failures.

mod common;

use common::{MockGateway, MockOutcome, config_create, seed_config, seed_connection, seed_txn};

use clipper_collect::collection::CollectionError;
use clipper_collect::db::platform_collection;
use shared::models::{CollectionStatus, CollectionType, NewCollection};
use shared::util;

const HOUR_MS: i64 = 3_600_000;

fn commission_request(barber_id: i64, amount_cents: i64, txn_ids: Vec<i64>) -> NewCollection {
    NewCollection {
        barber_id,
        collection_type: CollectionType::Commission,
        amount_cents,
        description: None,
        period_start: None,
        period_end: None,
        related_transaction_ids: txn_ids,
        auto_collect: false,
    }
}

#[tokio::test]
async fn transient_failure_schedules_first_retry() {
    let (_dir, pool) = common::setup_db().await;

    seed_config(&pool, config_create(1)).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Transient);
    let service = common::service_with(&pool, gateway);

    let before = util::now_millis();
    let collection = service
        .create_collection(NewCollection {
            auto_collect: true,
            ..commission_request(1, txn.commission_cents, vec![txn.id])
        })
        .await
        .expect("creation survives a failed auto-collect attempt");

    // Not FAILED: the transient error re-queued the record
    assert_eq!(collection.status, CollectionStatus::Pending);
    assert_eq!(collection.retry_count, 1);
    assert!(collection.failure_reason.is_some());

    // scheduled_at ≈ now + 1h
    let delay = collection.scheduled_at - before;
    assert!(
        (HOUR_MS - 10_000..=HOUR_MS + 60_000).contains(&delay),
        "first retry should be ~1h out, got {delay}ms"
    );
}

#[tokio::test]
async fn backoff_grows_and_attempt_budget_is_enforced() {
    let (_dir, pool) = common::setup_db().await;

    seed_config(&pool, config_create(1)).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Transient);
    let service = common::service_with(&pool, gateway.clone());

    let created = service
        .create_collection(commission_request(1, txn.commission_cents, vec![txn.id]))
        .await
        .expect("create");

    // Attempt 1: re-queued 1h out
    service.attempt_collection(created.id).await;
    let after1 = platform_collection::find_by_id(&pool, created.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(after1.status, CollectionStatus::Pending);
    assert_eq!(after1.retry_count, 1);

    // Attempt 2: re-queued further out than attempt 1 left it
    service.attempt_collection(created.id).await;
    let after2 = platform_collection::find_by_id(&pool, created.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(after2.retry_count, 2);
    assert!(after2.scheduled_at > after1.scheduled_at);

    // Attempt 3 exhausts the budget: terminal FAILED
    service.attempt_collection(created.id).await;
    let after3 = platform_collection::find_by_id(&pool, created.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(after3.retry_count, 3);
    assert_eq!(after3.status, CollectionStatus::Failed);

    // No further attempt without a manual call; the record is unclaimable
    let calls_before = gateway.call_count();
    let result = service.attempt_collection(created.id).await;
    assert!(!result.success);
    assert_eq!(gateway.call_count(), calls_before);

    // And the manual path refuses an exhausted budget
    let err = service
        .retry_failed_collection(created.id)
        .await
        .expect_err("budget exhausted");
    assert!(matches!(err, CollectionError::RetryLimitExceeded(_)));
}

#[tokio::test]
async fn batch_isolates_per_item_failures() {
    let (_dir, pool) = common::setup_db().await;

    let gateway = MockGateway::new(MockOutcome::Settle);
    // Barber 3's funding source misbehaves
    gateway.set_for("bank-3", MockOutcome::Transient);
    let service = common::service_with(&pool, gateway);

    for barber_id in 1..=5 {
        seed_config(&pool, config_create(barber_id)).await;
        let conn = seed_connection(&pool, barber_id).await;
        let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;
        service
            .create_collection(commission_request(
                barber_id,
                txn.commission_cents,
                vec![txn.id],
            ))
            .await
            .expect("create");
    }

    let results = service
        .process_scheduled_collections(10)
        .await
        .expect("batch run");

    assert_eq!(results.len(), 5);
    for result in &results {
        if result.barber_id == 3 {
            assert!(!result.success);
            assert_eq!(result.status, CollectionStatus::Pending); // re-queued
        } else {
            assert!(result.success, "barber {} unaffected", result.barber_id);
            assert_eq!(result.status, CollectionStatus::Collected);
        }
    }
}

#[tokio::test]
async fn missing_instrument_fails_terminally_without_retries() {
    let (_dir, pool) = common::setup_db().await;

    // ACH method but no funding source on file
    let mut cfg = config_create(1);
    cfg.funding_source_ref = None;
    seed_config(&pool, cfg).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Settle);
    let service = common::service_with(&pool, gateway.clone());

    let collection = service
        .create_collection(NewCollection {
            auto_collect: true,
            ..commission_request(1, txn.commission_cents, vec![txn.id])
        })
        .await
        .expect("creation itself succeeds");

    // Validation failures go straight to FAILED: no backoff, no rail call
    assert_eq!(collection.status, CollectionStatus::Failed);
    assert_eq!(collection.retry_count, 1);
    assert!(
        collection
            .failure_reason
            .as_deref()
            .is_some_and(|r| r.contains("ACH instrument"))
    );
    assert_eq!(gateway.call_count(), 0);

    // Not eligible for the scheduler
    let results = service
        .process_scheduled_collections(10)
        .await
        .expect("batch run");
    assert!(results.is_empty());
}

#[tokio::test]
async fn manual_retry_recovers_a_failed_collection() {
    let (_dir, pool) = common::setup_db().await;

    // First attempt fails on validation (no funding source)
    let mut cfg = config_create(1);
    cfg.funding_source_ref = None;
    seed_config(&pool, cfg).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Settle);
    let service = common::service_with(&pool, gateway);

    let collection = service
        .create_collection(NewCollection {
            auto_collect: true,
            ..commission_request(1, txn.commission_cents, vec![txn.id])
        })
        .await
        .expect("create");
    assert_eq!(collection.status, CollectionStatus::Failed);

    // Operator fixes the config, then retries manually
    seed_config(&pool, config_create(1)).await;
    let result = service
        .retry_failed_collection(collection.id)
        .await
        .expect("manual retry");
    assert!(result.success);
    assert_eq!(result.status, CollectionStatus::Collected);

    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(row.status, CollectionStatus::Collected);
    assert_eq!(row.retry_count, 2);
}

#[tokio::test]
async fn manual_retry_rejects_collected_records() {
    let (_dir, pool) = common::setup_db().await;

    seed_config(&pool, config_create(1)).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Settle);
    let service = common::service_with(&pool, gateway);

    let collection = service
        .create_collection(NewCollection {
            auto_collect: true,
            ..commission_request(1, txn.commission_cents, vec![txn.id])
        })
        .await
        .expect("create");
    assert_eq!(collection.status, CollectionStatus::Collected);

    let err = service
        .retry_failed_collection(collection.id)
        .await
        .expect_err("collected records cannot be retried");
    assert!(matches!(err, CollectionError::InvalidState(_)));
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let (_dir, pool) = common::setup_db().await;
    seed_config(&pool, config_create(1)).await;

    let gateway = MockGateway::new(MockOutcome::Settle);
    let service = common::service_with(&pool, gateway);

    let err = service
        .create_collection(commission_request(1, 0, vec![]))
        .await
        .expect_err("zero amount");
    assert!(matches!(err, CollectionError::Validation(_)));
}
