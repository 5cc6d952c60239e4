//! Webhook reconciliation: async rail confirmation, idempotent duplicate
//! delivery, and the atomicity of the finalize step.

mod common;

use common::{MockGateway, MockOutcome, config_create, seed_config, seed_connection, seed_txn};

use clipper_collect::collection::{RailStatus, ReconcileOutcome};
use clipper_collect::db::platform_collection;
use shared::models::{CollectionStatus, CollectionType, NewCollection};
use shared::util;

async fn pending_rail_collection(
    pool: &sqlx::SqlitePool,
    service: &clipper_collect::CollectionService,
) -> (shared::models::PlatformCollection, String) {
    seed_config(pool, config_create(1)).await;
    let conn = seed_connection(pool, 1).await;
    let txn = seed_txn(pool, conn.id, 10_000, 1_000).await;

    let collection = service
        .create_collection(NewCollection {
            barber_id: 1,
            collection_type: CollectionType::Commission,
            amount_cents: txn.commission_cents,
            description: None,
            period_start: None,
            period_end: None,
            related_transaction_ids: vec![txn.id],
            auto_collect: true,
        })
        .await
        .expect("create");

    // ACH-style: accepted by the rail, awaiting webhook
    assert_eq!(collection.status, CollectionStatus::Processing);
    let gateway_txn = collection
        .gateway_transaction_id
        .clone()
        .expect("rail reference recorded");
    (collection, gateway_txn)
}

#[tokio::test]
async fn completed_webhook_finalizes_once() {
    let (_dir, pool) = common::setup_db().await;
    let gateway = MockGateway::new(MockOutcome::Pending);
    let service = common::service_with(&pool, gateway);

    let (collection, gateway_txn) = pending_rail_collection(&pool, &service).await;

    let outcome = service
        .reconcile_transfer_status(&gateway_txn, RailStatus::Completed)
        .await
        .expect("reconcile");
    assert_eq!(outcome, ReconcileOutcome::Collected);

    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(row.status, CollectionStatus::Collected);
    let collected_at = row.collected_at.expect("collected_at set");

    let marked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM external_transactions WHERE commission_collected = 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(marked, 1);

    // Duplicate delivery: no-op, nothing moves
    let outcome = service
        .reconcile_transfer_status(&gateway_txn, RailStatus::Completed)
        .await
        .expect("duplicate reconcile");
    assert_eq!(outcome, ReconcileOutcome::AlreadyFinal);

    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(row.collected_at, Some(collected_at));

    let marked_again: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM external_transactions WHERE commission_collected = 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(marked_again, marked);
}

#[tokio::test]
async fn failed_webhook_schedules_retry_then_duplicates_noop() {
    let (_dir, pool) = common::setup_db().await;
    let gateway = MockGateway::new(MockOutcome::Pending);
    let service = common::service_with(&pool, gateway);

    let (collection, gateway_txn) = pending_rail_collection(&pool, &service).await;

    let outcome = service
        .reconcile_transfer_status(&gateway_txn, RailStatus::Failed)
        .await
        .expect("reconcile");
    assert_eq!(outcome, ReconcileOutcome::RetryScheduled);

    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(row.status, CollectionStatus::Pending);
    assert!(row.scheduled_at > util::now_millis());
    assert!(row.failure_reason.is_some());

    // The ledger row stays uncollected
    let marked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM external_transactions WHERE commission_collected = 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(marked, 0);

    // Duplicate failure delivery finds a non-PROCESSING record: no-op
    let outcome = service
        .reconcile_transfer_status(&gateway_txn, RailStatus::Failed)
        .await
        .expect("duplicate reconcile");
    assert_eq!(outcome, ReconcileOutcome::AlreadyFinal);

    let after = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(after.retry_count, row.retry_count);
    assert_eq!(after.scheduled_at, row.scheduled_at);
}

#[tokio::test]
async fn unknown_rail_reference_is_not_an_error() {
    let (_dir, pool) = common::setup_db().await;
    let gateway = MockGateway::new(MockOutcome::Pending);
    let service = common::service_with(&pool, gateway);

    let outcome = service
        .reconcile_transfer_status("transfer-nobody-knows", RailStatus::Completed)
        .await
        .expect("reconcile");
    assert_eq!(outcome, ReconcileOutcome::Unknown);
}

#[tokio::test]
async fn finalize_applies_status_and_ledger_together_or_not_at_all() {
    let (_dir, pool) = common::setup_db().await;
    let gateway = MockGateway::new(MockOutcome::Pending);
    let service = common::service_with(&pool, gateway);

    let (collection, _gateway_txn) = pending_rail_collection(&pool, &service).await;
    let now = util::now_millis();

    // Finalizing the PROCESSING record applies both effects
    let applied = platform_collection::finalize_collected(&pool, collection.id, None, None, None, now)
        .await
        .expect("finalize");
    assert!(applied);

    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    let marked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM external_transactions WHERE commission_collected = 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(row.status, CollectionStatus::Collected);
    assert_eq!(marked, 1);

    // A second finalize is refused and re-marks nothing
    let applied = platform_collection::finalize_collected(&pool, collection.id, None, None, None, now)
        .await
        .expect("finalize again");
    assert!(!applied);
}

#[tokio::test]
async fn finalize_refuses_records_that_are_not_processing() {
    let (_dir, pool) = common::setup_db().await;

    seed_config(&pool, config_create(1)).await;
    let conn = seed_connection(&pool, 1).await;
    let txn = seed_txn(&pool, conn.id, 10_000, 1_000).await;

    let gateway = MockGateway::new(MockOutcome::Pending);
    let service = common::service_with(&pool, gateway);

    // PENDING record (no attempt yet)
    let collection = service
        .create_collection(NewCollection {
            barber_id: 1,
            collection_type: CollectionType::Commission,
            amount_cents: txn.commission_cents,
            description: None,
            period_start: None,
            period_end: None,
            related_transaction_ids: vec![txn.id],
            auto_collect: false,
        })
        .await
        .expect("create");

    let applied = platform_collection::finalize_collected(
        &pool,
        collection.id,
        None,
        None,
        None,
        util::now_millis(),
    )
    .await
    .expect("finalize");
    assert!(!applied);

    // Neither effect leaked: status unchanged, ledger untouched
    let row = platform_collection::find_by_id(&pool, collection.id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(row.status, CollectionStatus::Pending);

    let marked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM external_transactions WHERE commission_collected = 1",
    )
    .fetch_one(&pool)
    .await
    .expect("count");
    assert_eq!(marked, 0);
}
