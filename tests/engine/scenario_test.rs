//! End-to-end product scenarios.

use std::sync::atomic::Ordering;

use inciguard::resilience::BreakerState;
use inciguard::types::{ProviderId, RiskLevel, Suitability};

use super::support::{engine_with, provider_mut, test_config, Behavior, MockProvider};

fn label_tokens() -> Vec<String> {
    vec![
        "Aqua".to_owned(),
        "Glycerin".to_owned(),
        "Sodium Lauryl Sulfate".to_owned(),
    ]
}

fn label_table() -> Behavior {
    Behavior::Table(vec![
        ("water", RiskLevel::None, 95.0),
        ("glycerin", RiskLevel::Low, 85.0),
        ("sodium lauryl sulfate", RiskLevel::High, 40.0),
    ])
}

#[tokio::test]
async fn full_label_analysis_flags_the_surfactant() {
    let (provider, _calls) = MockProvider::new(ProviderId::Faers, label_table());
    let engine = engine_with(test_config(), vec![provider]).await;

    let analysis = engine
        .resolve_ingredients(&label_tokens(), "general", "baby shampoo")
        .await
        .expect("resolves");

    assert_eq!(analysis.product_name, "baby shampoo");
    assert_eq!(analysis.avg_eco_score, 73.0);
    assert_eq!(analysis.suitability, Suitability::Caution);
    assert!(analysis.recommendations.contains("sodium lauryl sulfate"));

    let scores: Vec<f64> = analysis
        .ingredients_details
        .iter()
        .map(|r| r.eco_score)
        .collect();
    assert_eq!(scores, vec![95.0, 85.0, 40.0]);

    engine.shutdown().await;
}

#[tokio::test]
async fn sensitive_context_forces_avoid_on_high_risk() {
    let (provider, _calls) = MockProvider::new(ProviderId::Faers, label_table());
    let engine = engine_with(test_config(), vec![provider]).await;

    let analysis = engine
        .resolve_ingredients(&label_tokens(), "sensitive skin", "")
        .await
        .expect("resolves");

    // Same score band, but the high-risk surfactant plus a sensitive
    // user context overrides the threshold verdict.
    assert_eq!(analysis.avg_eco_score, 73.0);
    assert_eq!(analysis.suitability, Suitability::Avoid);

    engine.shutdown().await;
}

#[tokio::test]
async fn failing_provider_trips_breaker_without_user_visible_errors() {
    let mut config = test_config();
    {
        let ewg = provider_mut(&mut config, ProviderId::Ewg);
        ewg.breaker.min_calls = 2;
        ewg.breaker.window = 5;
        ewg.breaker.failure_rate = 0.5;
        ewg.breaker.open_secs = 300;
    }

    let (ewg, ewg_calls) = MockProvider::new(ProviderId::Ewg, Behavior::FailStatus(500));
    let (cir, cir_calls) = MockProvider::new(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
    );
    let engine = engine_with(config, vec![ewg, cir]).await;

    let names = [
        "alphaol", "betaol", "gammaol", "deltaol", "epsilonol", "zetaol",
    ];
    for name in names {
        let record = engine.get_ingredient(name).await.expect("resolves");
        assert_eq!(record.risk_level, RiskLevel::Low, "{name} uses the healthy source");
    }

    // The breaker opened after two failures; later resolutions never
    // reached the failing adapter.
    assert_eq!(ewg_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cir_calls.load(Ordering::SeqCst), names.len() as u64);

    let health = engine.health().await;
    let ewg_health = health.providers.get("ewg").expect("ewg reported");
    assert_eq!(ewg_health.breaker_state, BreakerState::Open);
    assert!(health.store_reachable);

    engine.shutdown().await;
}

#[tokio::test]
async fn unreachable_store_surfaces_internal_error() {
    use inciguard::providers::registry::ProviderRegistry;
    use inciguard::store::RelationalStore;

    let (provider, calls) = MockProvider::new(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
    );
    let config = test_config();
    let store = RelationalStore::connect(":memory:")
        .await
        .expect("store connects");
    let registry = ProviderRegistry::from_adapters(&config, vec![provider]);
    let engine = inciguard::engine::Engine::with_parts(config, registry, store.clone());

    store.pool().close().await;

    let err = engine
        .resolve_ingredients(&["Bakuchiol".to_owned()], "general", "")
        .await
        .expect_err("store is down");
    assert_eq!(err.code(), "internal_error");

    // The failure happened before any fan-out or cache population.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let health = engine.health().await;
    assert_eq!(health.cache.size, 0);
    assert!(!health.store_reachable);
    let cir = health.providers.get("cir").expect("cir reported");
    assert_eq!(cir.breaker_state, BreakerState::Closed);

    engine.shutdown().await;
}
