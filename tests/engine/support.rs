//! Shared test support: deterministic mock providers and engine assembly.
//!
//! Included by several test harnesses; not every harness uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use inciguard::config::{
    BreakerConfig, BulkheadConfig, EngineConfig, ProviderConfig, RateLimitConfig, RetryConfig,
};
use inciguard::engine::Engine;
use inciguard::providers::registry::ProviderRegistry;
use inciguard::providers::{ProviderError, SourceProvider};
use inciguard::store::RelationalStore;
use inciguard::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

/// What a [`MockProvider`] does for each fetch.
pub enum Behavior {
    /// Answer every name with this classification.
    Answer {
        /// Risk to report.
        risk: RiskLevel,
        /// Eco score to report.
        eco: Option<f64>,
    },
    /// Answer only the listed canonical names; 404 for the rest.
    Table(Vec<(&'static str, RiskLevel, f64)>),
    /// Always fail with this HTTP status.
    FailStatus(u16),
    /// Fail with 500 for the first N calls, then answer low-risk.
    FailFirst(u64),
}

/// A scripted source adapter with an observable call counter.
pub struct MockProvider {
    id: ProviderId,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicU64>,
}

impl MockProvider {
    /// Build a provider and return it with its call counter.
    pub fn new(id: ProviderId, behavior: Behavior) -> (Arc<Self>, Arc<AtomicU64>) {
        Self::with_delay(id, behavior, Duration::ZERO)
    }

    /// Like [`MockProvider::new`], sleeping `delay` inside each fetch.
    pub fn with_delay(
        id: ProviderId,
        behavior: Behavior,
        delay: Duration,
    ) -> (Arc<Self>, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let provider = Arc::new(Self {
            id,
            behavior,
            delay,
            calls: Arc::clone(&calls),
        });
        (provider, calls)
    }

    fn answer(&self, name: &CanonicalName, risk: RiskLevel, eco: Option<f64>) -> IngredientFact {
        IngredientFact {
            provider: self.id,
            name: name.clone(),
            fetched_at: Utc::now(),
            status: FactStatus::Ok,
            risk,
            eco_score: eco,
            benefits: String::new(),
            risks_detailed: String::new(),
            raw_summary: "mock".to_owned(),
        }
    }
}

#[async_trait]
impl SourceProvider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn fetch(&self, name: &CanonicalName) -> Result<IngredientFact, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Answer { risk, eco } => Ok(self.answer(name, *risk, *eco)),
            Behavior::Table(entries) => entries
                .iter()
                .find(|(entry_name, _, _)| *entry_name == name.as_str())
                .map(|(_, risk, eco)| self.answer(name, *risk, Some(*eco)))
                .ok_or(ProviderError::HttpStatus {
                    status: 404,
                    body: "not found".to_owned(),
                }),
            Behavior::FailStatus(status) => Err(ProviderError::HttpStatus {
                status: *status,
                body: "mock failure".to_owned(),
            }),
            Behavior::FailFirst(failures) => {
                if call < *failures {
                    Err(ProviderError::HttpStatus {
                        status: 500,
                        body: "mock transient failure".to_owned(),
                    })
                } else {
                    Ok(self.answer(name, RiskLevel::Low, Some(80.0)))
                }
            }
        }
    }
}

/// Default engine config tuned for tests: generous throttles, no retries,
/// seed catalog excluded from scoring.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    for p in &mut config.providers {
        p.rate_limit = RateLimitConfig {
            period_secs: 1,
            limit: 10_000,
            acquire_timeout_ms: 1_000,
        };
        p.retry = RetryConfig {
            max_retries: 0,
            base_backoff_ms: 1,
        };
        p.per_call_deadline_ms = 5_000;
    }
    config.providers.push(seed_merge_entry());
    config
}

/// Seed catalog entry with zero weight so scenario scores come only from
/// the scripted providers.
fn seed_merge_entry() -> ProviderConfig {
    ProviderConfig {
        id: ProviderId::LocalSeed,
        enabled: true,
        base_url: String::new(),
        auth_env: String::new(),
        priority: 1_000,
        weight: 0.0,
        ttl_seconds: 86_400,
        rate_limit: RateLimitConfig::default(),
        breaker: BreakerConfig::default(),
        bulkhead: BulkheadConfig::default(),
        retry: RetryConfig::default(),
        per_call_deadline_ms: 5_000,
    }
}

/// Engine over an in-memory store and the given adapters.
pub async fn engine_with(
    config: EngineConfig,
    adapters: Vec<Arc<dyn SourceProvider>>,
) -> Engine {
    let store = RelationalStore::connect(":memory:")
        .await
        .expect("in-memory store connects");
    let registry = ProviderRegistry::from_adapters(&config, adapters);
    Engine::with_parts(config, registry, store)
}

/// Provider config lookup helper for tests that tune one provider.
pub fn provider_mut(config: &mut EngineConfig, id: ProviderId) -> &mut ProviderConfig {
    config
        .providers
        .iter_mut()
        .find(|p| p.id == id)
        .expect("provider configured")
}
