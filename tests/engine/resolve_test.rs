//! Resolution ladder behavior: caching, deduplication, unknown handling.

use std::sync::atomic::Ordering;

use inciguard::engine::EngineError;
use inciguard::types::{ProviderId, RiskLevel, Suitability};

use super::support::{engine_with, test_config, Behavior, MockProvider};

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let (provider, calls) = MockProvider::new(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
    );
    let engine = engine_with(test_config(), vec![provider]).await;

    let analysis = engine
        .resolve_ingredients(&["Bakuchiol".to_owned()], "general", "serum")
        .await
        .expect("resolves");
    assert_eq!(analysis.ingredients_details.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The very next single-ingredient lookup must not reach the adapter.
    let record = engine.get_ingredient("Bakuchiol").await.expect("resolves");
    assert_eq!(record.risk_level, RiskLevel::Low);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "cache hit expected");

    engine.shutdown().await;
}

#[tokio::test]
async fn measurements_and_duplicates_collapse_before_fanout() {
    let (provider, calls) = MockProvider::new(
        ProviderId::Cir,
        Behavior::Table(vec![("water", RiskLevel::None, 95.0)]),
    );
    let engine = engine_with(test_config(), vec![provider]).await;

    let tokens = vec!["1 mg".to_owned(), "Water".to_owned(), "Water".to_owned()];
    let analysis = engine
        .resolve_ingredients(&tokens, "general", "")
        .await
        .expect("resolves");

    assert_eq!(analysis.ingredients_details.len(), 1);
    assert_eq!(
        analysis.ingredients_details[0].canonical_name.as_str(),
        "water"
    );
    // One fan-out for the one unique name, one registered provider.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn unmatched_ingredient_yields_unknown_record() {
    let (provider, _calls) = MockProvider::new(ProviderId::Ewg, Behavior::Table(vec![]));
    let engine = engine_with(test_config(), vec![provider]).await;

    let analysis = engine
        .resolve_ingredients(&["Unknownium Exoticum".to_owned()], "general", "")
        .await
        .expect("no information is not an error");

    let record = &analysis.ingredients_details[0];
    assert_eq!(record.risk_level, RiskLevel::Unknown);
    assert_eq!(record.eco_score, 50.0);
    assert!(record.sources.is_empty());
    assert_eq!(analysis.avg_eco_score, 50.0);
    assert_eq!(analysis.suitability, Suitability::Caution);

    engine.shutdown().await;
}

#[tokio::test]
async fn invalid_inputs_are_rejected_with_stable_code() {
    let (provider, _calls) = MockProvider::new(
        ProviderId::Ewg,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
    );
    let engine = engine_with(test_config(), vec![provider]).await;

    let empty: Vec<String> = Vec::new();
    let err = engine
        .resolve_ingredients(&empty, "general", "")
        .await
        .expect_err("empty list is invalid");
    assert_eq!(err.code(), "invalid_input");

    let oversized = vec!["x".repeat(500)];
    let err = engine
        .resolve_ingredients(&oversized, "general", "")
        .await
        .expect_err("oversized token is invalid");
    assert_eq!(err.code(), "invalid_input");

    let err = engine
        .get_ingredient("5 µg/L")
        .await
        .expect_err("measurement is not an ingredient");
    assert!(matches!(err, EngineError::InvalidInput { .. }));

    engine.shutdown().await;
}

#[tokio::test]
async fn seed_catalog_answers_when_all_providers_fail() {
    let (provider, _calls) =
        MockProvider::new(ProviderId::Ewg, Behavior::FailStatus(503));
    let engine = engine_with(test_config(), vec![provider]).await;

    // Glycerin is seeded; a full provider outage still classifies it.
    let record = engine.get_ingredient("Glycerin").await.expect("resolves");
    assert_eq!(record.risk_level, RiskLevel::None);
    assert_eq!(record.sources, vec![ProviderId::LocalSeed]);

    engine.shutdown().await;
}
