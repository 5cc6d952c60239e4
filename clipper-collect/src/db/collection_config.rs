//! Collection config repository
//!
//! One active policy row per barber; `upsert` replaces in place so the
//! "exactly one active config" invariant holds structurally.

use super::RepoResult;
use shared::models::{CollectionConfig, CollectionConfigCreate};
use shared::util;
use sqlx::SqlitePool;

const CONFIG_COLUMNS: &str = "barber_id, payment_mode, collection_method, collection_frequency, booth_rent_cents, minimum_collection_cents, auto_collection, funding_source_ref, payment_method_ref, created_at, updated_at";

pub async fn upsert(
    pool: &SqlitePool,
    data: CollectionConfigCreate,
) -> RepoResult<CollectionConfig> {
    let now = util::now_millis();
    sqlx::query(
        "INSERT INTO collection_configs (barber_id, payment_mode, collection_method, collection_frequency, booth_rent_cents, minimum_collection_cents, auto_collection, funding_source_ref, payment_method_ref, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT (barber_id) DO UPDATE SET
            payment_mode = excluded.payment_mode,
            collection_method = excluded.collection_method,
            collection_frequency = excluded.collection_frequency,
            booth_rent_cents = excluded.booth_rent_cents,
            minimum_collection_cents = excluded.minimum_collection_cents,
            auto_collection = excluded.auto_collection,
            funding_source_ref = excluded.funding_source_ref,
            payment_method_ref = excluded.payment_method_ref,
            updated_at = excluded.updated_at",
    )
    .bind(data.barber_id)
    .bind(data.payment_mode)
    .bind(data.collection_method)
    .bind(data.collection_frequency)
    .bind(data.booth_rent_cents)
    .bind(data.minimum_collection_cents)
    .bind(data.auto_collection)
    .bind(&data.funding_source_ref)
    .bind(&data.payment_method_ref)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_barber(pool, data.barber_id)
        .await?
        .ok_or_else(|| super::RepoError::Database("Failed to upsert collection config".into()))
}

pub async fn find_by_barber(
    pool: &SqlitePool,
    barber_id: i64,
) -> RepoResult<Option<CollectionConfig>> {
    let config = sqlx::query_as::<_, CollectionConfig>(&format!(
        "SELECT {CONFIG_COLUMNS} FROM collection_configs WHERE barber_id = ?"
    ))
    .bind(barber_id)
    .fetch_optional(pool)
    .await?;
    Ok(config)
}

/// Barbers whose commission is collected after the fact by this engine
pub async fn list_decentralized(pool: &SqlitePool) -> RepoResult<Vec<CollectionConfig>> {
    let configs = sqlx::query_as::<_, CollectionConfig>(&format!(
        "SELECT {CONFIG_COLUMNS} FROM collection_configs WHERE payment_mode = 'DECENTRALIZED' ORDER BY barber_id ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(configs)
}
