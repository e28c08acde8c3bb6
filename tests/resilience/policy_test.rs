//! Rate limiter, bulkhead, retry, and deadline behavior of the wrapped
//! provider.

use std::sync::atomic::Ordering;
use std::time::Duration;

use inciguard::config::{ProviderConfig, RateLimitConfig, RetryConfig};
use inciguard::resilience::ResilientProvider;
use inciguard::types::{FactStatus, FailureCode, ProviderId, RiskLevel};

use super::support::{Behavior, MockProvider};

fn base_config(id: ProviderId) -> ProviderConfig {
    super::support::test_config()
        .providers
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .unwrap_or_else(|| panic!("{id} configured"))
}

fn name(raw: &str) -> inciguard::types::CanonicalName {
    inciguard::canonical::canonicalize(raw).expect("test name canonicalizes")
}

#[tokio::test(start_paused = true)]
async fn exhausted_bucket_fails_with_rate_limited() {
    let mut config = base_config(ProviderId::Ewg);
    config.rate_limit = RateLimitConfig {
        period_secs: 60,
        limit: 1,
        acquire_timeout_ms: 10,
    };

    let (mock, calls) = MockProvider::new(
        ProviderId::Ewg,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
    );
    let provider = ResilientProvider::new(mock, &config);

    let first = provider.fetch_fact(&name("glycerin")).await;
    assert_eq!(first.status, FactStatus::Ok);

    let second = provider.fetch_fact(&name("glycerin")).await;
    assert_eq!(
        second.status,
        FactStatus::Failed(FailureCode::RateLimited)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1, "limited call never fetched");
}

#[tokio::test]
async fn full_bulkhead_fails_fast() {
    let mut config = base_config(ProviderId::Ewg);
    config.bulkhead.max_concurrent = 1;

    let (mock, _calls) = MockProvider::with_delay(
        ProviderId::Ewg,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
        Duration::from_millis(100),
    );
    let provider = std::sync::Arc::new(ResilientProvider::new(mock, &config));

    let slow = {
        let provider = std::sync::Arc::clone(&provider);
        tokio::spawn(async move { provider.fetch_fact(&name("glycerin")).await })
    };
    // Give the first call time to occupy the bulkhead.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let rejected = provider.fetch_fact(&name("tocopherol")).await;

    assert_eq!(
        rejected.status,
        FactStatus::Failed(FailureCode::BulkheadFull)
    );
    let slow = slow.await.expect("joins");
    assert_eq!(slow.status, FactStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_succeed() {
    let mut config = base_config(ProviderId::Ewg);
    config.retry = RetryConfig {
        max_retries: 2,
        base_backoff_ms: 10,
    };
    // Keep the breaker out of the way.
    config.breaker.min_calls = 100;

    let (mock, calls) = MockProvider::new(ProviderId::Ewg, Behavior::FailFirst(2));
    let provider = ResilientProvider::new(mock, &config);

    let fact = provider.fetch_fact(&name("glycerin")).await;
    assert_eq!(fact.status, FactStatus::Ok);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "two retries then success");
}

#[tokio::test]
async fn hard_4xx_is_never_retried() {
    let mut config = base_config(ProviderId::Ewg);
    config.retry = RetryConfig {
        max_retries: 3,
        base_backoff_ms: 1,
    };

    let (mock, calls) = MockProvider::new(ProviderId::Ewg, Behavior::FailStatus(404));
    let provider = ResilientProvider::new(mock, &config);

    let fact = provider.fetch_fact(&name("glycerin")).await;
    assert_eq!(fact.status, FactStatus::Failed(FailureCode::Upstream4xx));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn per_call_deadline_yields_timeout_fact() {
    let mut config = base_config(ProviderId::Ewg);
    config.per_call_deadline_ms = 50;

    let (mock, _calls) = MockProvider::with_delay(
        ProviderId::Ewg,
        Behavior::Answer {
            risk: RiskLevel::Low,
            eco: Some(80.0),
        },
        Duration::from_secs(10),
    );
    let provider = ResilientProvider::new(mock, &config);

    let fact = provider.fetch_fact(&name("glycerin")).await;
    assert_eq!(fact.status, FactStatus::Failed(FailureCode::Timeout));
    assert_eq!(fact.name.as_str(), "glycerin");
}
