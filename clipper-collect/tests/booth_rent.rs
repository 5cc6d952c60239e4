//! Booth-rent calculation: proration, idempotent period coverage, and the
//! unconfigured-barber zero result.

mod common;

use common::{MockGateway, MockOutcome, config_create, seed_config};

use clipper_collect::collection::{CollectionError, calculator};
use shared::models::{CollectionType, NewCollection};
use shared::util;

const DAY_MS: i64 = 86_400_000;

#[tokio::test]
async fn weekly_rent_prorates_over_two_weeks() {
    let (_dir, pool) = common::setup_db().await;

    // $250.00/week
    let mut cfg = config_create(1);
    cfg.booth_rent_cents = Some(25_000);
    seed_config(&pool, cfg).await;

    let period_start = util::now_millis() - 14 * DAY_MS;
    let period_end = period_start + 14 * DAY_MS;

    let due = calculator::calculate_booth_rent(&pool, 1, period_start, period_end)
        .await
        .expect("calculate");

    assert!(due.configured);
    assert_eq!(due.amount_cents, 50_000); // $500.00
    assert_eq!(due.period_days, 14);
    assert!(!due.already_collected);
    assert!(due.existing_collection_id.is_none());
}

#[tokio::test]
async fn covering_collection_makes_period_already_collected() {
    let (_dir, pool) = common::setup_db().await;

    let mut cfg = config_create(1);
    cfg.booth_rent_cents = Some(25_000);
    seed_config(&pool, cfg).await;

    let period_start = util::now_millis() - 7 * DAY_MS;
    let period_end = period_start + 7 * DAY_MS;

    let gateway = MockGateway::new(MockOutcome::Settle);
    let service = common::service_with(&pool, gateway);

    // A PENDING booth-rent record covering the period already exists
    let existing = service
        .create_collection(NewCollection {
            barber_id: 1,
            collection_type: CollectionType::BoothRent,
            amount_cents: 25_000,
            description: Some("Booth rent".into()),
            period_start: Some(period_start),
            period_end: Some(period_end),
            related_transaction_ids: vec![],
            auto_collect: false,
        })
        .await
        .expect("create");

    let due = calculator::calculate_booth_rent(&pool, 1, period_start, period_end)
        .await
        .expect("calculate");
    assert!(due.already_collected);
    assert_eq!(due.existing_collection_id, Some(existing.id));

    // A sub-period is also covered
    let due = calculator::calculate_booth_rent(
        &pool,
        1,
        period_start + DAY_MS,
        period_end - DAY_MS,
    )
    .await
    .expect("calculate");
    assert!(due.already_collected);

    // A later period is not
    let due = calculator::calculate_booth_rent(
        &pool,
        1,
        period_end,
        period_end + 7 * DAY_MS,
    )
    .await
    .expect("calculate");
    assert!(!due.already_collected);
}

#[tokio::test]
async fn unconfigured_rent_yields_zero_not_error() {
    let (_dir, pool) = common::setup_db().await;

    // Config exists but carries no booth rent
    seed_config(&pool, config_create(1)).await;

    let end = util::now_millis();
    let due = calculator::calculate_booth_rent(&pool, 1, end - 7 * DAY_MS, end)
        .await
        .expect("calculate");

    assert!(!due.configured);
    assert_eq!(due.amount_cents, 0);
    assert!(!due.already_collected);
}

#[tokio::test]
async fn inverted_period_is_a_validation_error() {
    let (_dir, pool) = common::setup_db().await;
    seed_config(&pool, config_create(1)).await;

    let now = util::now_millis();
    let err = calculator::calculate_booth_rent(&pool, 1, now, now - DAY_MS)
        .await
        .expect_err("inverted period");
    assert!(matches!(err, CollectionError::Validation(_)));
}

#[tokio::test]
async fn daily_frequency_prorates_per_day() {
    let (_dir, pool) = common::setup_db().await;

    // $40.00/day
    let mut cfg = config_create(1);
    cfg.booth_rent_cents = Some(4_000);
    cfg.collection_frequency = shared::models::CollectionFrequency::Daily;
    seed_config(&pool, cfg).await;

    let end = util::now_millis();
    let due = calculator::calculate_booth_rent(&pool, 1, end - 5 * DAY_MS, end)
        .await
        .expect("calculate");
    assert_eq!(due.amount_cents, 20_000); // $200.00
}
