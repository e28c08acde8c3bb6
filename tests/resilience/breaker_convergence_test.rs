//! Breaker convergence: consecutive failures open the circuit and stop
//! reaching the adapter.

use std::sync::atomic::Ordering;

use inciguard::config::RetryConfig;
use inciguard::resilience::{BreakerState, ResilientProvider};
use inciguard::types::{FactStatus, FailureCode, ProviderId};

use super::support::{Behavior, MockProvider};

#[tokio::test]
async fn consecutive_failures_open_the_breaker() {
    let mut config = super::support::test_config()
        .providers
        .iter()
        .find(|p| p.id == ProviderId::Ewg)
        .cloned()
        .expect("ewg configured");
    config.breaker.min_calls = 3;
    config.breaker.window = 10;
    config.breaker.failure_rate = 0.5;
    config.breaker.open_secs = 300;
    config.retry = RetryConfig {
        max_retries: 0,
        base_backoff_ms: 1,
    };

    let (mock, calls) = MockProvider::new(ProviderId::Ewg, Behavior::FailStatus(500));
    let provider = ResilientProvider::new(mock, &config);
    let name = inciguard::canonical::canonicalize("glycerin").expect("canonicalizes");

    // Three failing calls reach the adapter and trip the breaker.
    for _ in 0..3 {
        let fact = provider.fetch_fact(&name).await;
        assert_eq!(fact.status, FactStatus::Failed(FailureCode::Upstream5xx));
    }
    assert_eq!(provider.health().breaker_state, BreakerState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Further calls are rejected without invoking the adapter.
    for _ in 0..5 {
        let fact = provider.fetch_fact(&name).await;
        assert_eq!(fact.status, FactStatus::Failed(FailureCode::BreakerOpen));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let health = provider.health();
    assert_eq!(health.breaker_state, BreakerState::Open);
    assert!(health.recent_error_rate >= 0.5);
}
