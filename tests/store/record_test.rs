//! Record upsert semantics: round trips, preserved creation time,
//! monotonic update time.
#![allow(clippy::arithmetic_side_effects)]

use chrono::{Duration, Utc};

use inciguard::canonical::canonicalize;
use inciguard::store::{RelationalStore, StoreError};
use inciguard::types::{CanonicalName, IngredientRecord, ProviderId, RiskLevel, SCHEMA_VERSION};

fn name(raw: &str) -> CanonicalName {
    canonicalize(raw).expect("test name canonicalizes")
}

fn record(raw: &str) -> IngredientRecord {
    let now = Utc::now();
    IngredientRecord {
        canonical_name: name(raw),
        eco_score: 80.0,
        risk_level: RiskLevel::Low,
        benefits: "humectant".to_owned(),
        risks_detailed: String::new(),
        sources: vec![ProviderId::Iarc, ProviderId::Faers, ProviderId::LocalSeed],
        created_at: now,
        updated_at: now,
        schema_version: SCHEMA_VERSION,
    }
}

async fn store() -> RelationalStore {
    RelationalStore::connect(":memory:")
        .await
        .expect("in-memory store connects")
}

#[tokio::test]
async fn round_trip_preserves_fields_and_source_order() {
    let store = store().await;
    let glycerin = record("glycerin");

    let written = store.upsert_record(&glycerin).await.expect("upserts");
    let read = store
        .get_record(&name("glycerin"))
        .await
        .expect("reads")
        .expect("row exists");

    assert_eq!(written, read);
    assert_eq!(read.eco_score, 80.0);
    assert_eq!(read.risk_level, RiskLevel::Low);
    assert_eq!(
        read.sources,
        vec![ProviderId::Iarc, ProviderId::Faers, ProviderId::LocalSeed]
    );
    assert_eq!(read.schema_version, SCHEMA_VERSION);
}

#[tokio::test]
async fn missing_record_reads_as_none() {
    let store = store().await;
    let absent = store.get_record(&name("bakuchiol")).await.expect("reads");
    assert!(absent.is_none());
}

#[tokio::test]
async fn upsert_keeps_created_at_and_never_rewinds_updated_at() {
    let store = store().await;

    let mut first = record("glycerin");
    first.created_at = Utc::now() - Duration::hours(48);
    first.updated_at = Utc::now();
    let first_written = store.upsert_record(&first).await.expect("upserts");

    // A replay carrying an older updated_at must not move time backwards.
    let mut replay = record("glycerin");
    replay.eco_score = 75.0;
    replay.created_at = Utc::now();
    replay.updated_at = first.updated_at - Duration::hours(2);
    let replayed = store.upsert_record(&replay).await.expect("upserts");

    assert_eq!(replayed.eco_score, 75.0, "semantic fields do update");
    assert_eq!(replayed.created_at, first_written.created_at);
    assert_eq!(replayed.updated_at, first_written.updated_at);

    // A genuinely newer write advances updated_at.
    let mut newer = record("glycerin");
    newer.updated_at = first.updated_at + Duration::hours(2);
    let advanced = store.upsert_record(&newer).await.expect("upserts");
    assert!(advanced.updated_at > first_written.updated_at);
}

#[tokio::test]
async fn corrupt_risk_level_is_reported_not_swallowed() {
    let store = store().await;
    store
        .upsert_record(&record("glycerin"))
        .await
        .expect("upserts");

    sqlx::query("UPDATE ingredient SET risk_level = 'radioactive' WHERE canonical_name = ?1")
        .bind("glycerin")
        .execute(store.pool())
        .await
        .expect("direct update");

    let result = store.get_record(&name("glycerin")).await;
    assert!(matches!(result, Err(StoreError::CorruptRow { .. })));
}
