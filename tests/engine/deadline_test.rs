//! Deadline enforcement.
//!
//! These run on the real clock: the resolution path awaits SQLite between
//! timers, which the paused-clock auto-advance does not model faithfully.

use std::time::Duration;

use inciguard::types::{ProviderId, RiskLevel};

use super::support::{engine_with, provider_mut, test_config, Behavior, MockProvider};

#[tokio::test]
async fn overall_deadline_bounds_slow_providers() {
    let mut config = test_config();
    config.orchestrator.overall_deadline_secs = 1;
    // Keep the per-call deadline out of the way so only the overall
    // budget can end the request.
    provider_mut(&mut config, ProviderId::Cir).per_call_deadline_ms = 60_000;

    let (provider, _calls) = MockProvider::with_delay(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
        Duration::from_secs(30),
    );
    let engine = engine_with(config, vec![provider]).await;

    let started = std::time::Instant::now();
    let err = engine
        .resolve_ingredients(&["Bakuchiol".to_owned()], "general", "")
        .await
        .expect_err("deadline must fire before the provider answers");
    assert_eq!(err.code(), "deadline_exceeded");
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "the call returned within the deadline plus slack"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn slow_provider_degrades_to_unknown_within_per_call_deadline() {
    let mut config = test_config();
    config.orchestrator.overall_deadline_secs = 30;
    provider_mut(&mut config, ProviderId::Cir).per_call_deadline_ms = 100;

    let (provider, _calls) = MockProvider::with_delay(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
        Duration::from_secs(2),
    );
    let engine = engine_with(config, vec![provider]).await;

    // The one provider times out; the ingredient degrades instead of
    // failing the call.
    let analysis = engine
        .resolve_ingredients(&["Bakuchiol".to_owned()], "general", "")
        .await
        .expect("slow providers never fail the request");
    assert_eq!(
        analysis.ingredients_details[0].risk_level,
        RiskLevel::Unknown
    );

    engine.shutdown().await;
}
