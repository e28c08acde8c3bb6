//! Reliability wrapper around every source adapter.
//!
//! Four policies compose, in order, around each fetch: token-bucket rate
//! limiting, a bulkhead concurrency cap, a sliding-window circuit breaker,
//! and transient-only retry with jittered exponential backoff. The whole
//! composition runs under a hard per-call deadline.
//!
//! [`ResilientProvider::fetch_fact`] never errors and never panics: every
//! failure class becomes a failure [`IngredientFact`] whose status names the
//! cause. Downstream components treat such facts as a missing source, not as
//! a resolution failure.
//!
//! Cancellation safety: dropping the future releases the bulkhead permit
//! and leaves no token reserved in the rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::providers::SourceProvider;
use crate::types::{CanonicalName, FailureCode, IngredientFact, ProviderId};

pub mod breaker;
pub mod rate_limiter;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use rate_limiter::TokenBucket;

/// Point-in-time per-provider health, for the health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    /// Breaker state string (`closed`, `open`, `half_open`).
    pub breaker_state: BreakerState,
    /// Failure rate over the breaker's sliding window, in [0, 1].
    pub recent_error_rate: f64,
    /// Mean adapter latency over completed calls, in milliseconds.
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
struct CallStats {
    latency_ms_sum: AtomicU64,
    completed: AtomicU64,
}

/// One source adapter wrapped in the full resilience stack.
pub struct ResilientProvider {
    inner: Arc<dyn SourceProvider>,
    limiter: TokenBucket,
    bulkhead: Arc<Semaphore>,
    breaker: CircuitBreaker,
    max_retries: u32,
    backoff_base: Duration,
    per_call_deadline: Duration,
    fact_ttl: Duration,
    stats: CallStats,
}

impl std::fmt::Debug for ResilientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientProvider")
            .field("provider", &self.inner.id())
            .field("breaker", &self.breaker.state())
            .finish_non_exhaustive()
    }
}

impl ResilientProvider {
    /// Wrap an adapter with the policies from its configuration.
    pub fn new(inner: Arc<dyn SourceProvider>, config: &ProviderConfig) -> Self {
        Self {
            inner,
            limiter: TokenBucket::new(&config.rate_limit),
            bulkhead: Arc::new(Semaphore::new(config.bulkhead.max_concurrent)),
            breaker: CircuitBreaker::new(&config.breaker),
            max_retries: config.retry.max_retries,
            backoff_base: Duration::from_millis(config.retry.base_backoff_ms),
            per_call_deadline: Duration::from_millis(config.per_call_deadline_ms),
            fact_ttl: Duration::from_secs(config.ttl_seconds),
            stats: CallStats::default(),
        }
    }

    /// The wrapped provider's identity.
    pub fn id(&self) -> ProviderId {
        self.inner.id()
    }

    /// TTL for caching this provider's facts.
    pub fn fact_ttl(&self) -> Duration {
        self.fact_ttl
    }

    /// Fetch one fact through the full policy stack.
    ///
    /// Always returns a fact; failures are encoded in its status.
    pub async fn fetch_fact(&self, name: &CanonicalName) -> IngredientFact {
        let provider = self.id();
        let guarded = self.fetch_guarded(name);
        match tokio::time::timeout(self.per_call_deadline, guarded).await {
            Ok(fact) => fact,
            Err(_) => {
                debug!(%provider, %name, "per-call deadline exceeded");
                IngredientFact::failure(provider, name.clone(), FailureCode::Timeout)
            }
        }
    }

    async fn fetch_guarded(&self, name: &CanonicalName) -> IngredientFact {
        let provider = self.id();

        if !self.limiter.acquire().await {
            debug!(%provider, %name, "rate limited");
            return IngredientFact::failure(provider, name.clone(), FailureCode::RateLimited);
        }

        // Fail fast rather than queueing behind the cap; the permit is
        // released when `_permit` drops, including on cancellation.
        let Ok(_permit) = self.bulkhead.try_acquire() else {
            debug!(%provider, %name, "bulkhead full");
            return IngredientFact::failure(provider, name.clone(), FailureCode::BulkheadFull);
        };

        let mut attempt: u32 = 0;
        loop {
            if !self.breaker.try_acquire() {
                debug!(%provider, %name, "breaker open");
                return IngredientFact::failure(provider, name.clone(), FailureCode::BreakerOpen);
            }

            let started = std::time::Instant::now();
            match self.inner.fetch(name).await {
                Ok(fact) => {
                    self.breaker.on_success();
                    self.record_latency(started);
                    return fact;
                }
                Err(error) => {
                    self.breaker.on_failure();
                    self.record_latency(started);
                    let code = retry::classify(&error);
                    let retryable = retry::is_transient(&error) && attempt < self.max_retries;
                    debug!(%provider, %name, code = code.as_str(), retryable, "provider call failed");
                    if !retryable {
                        return IngredientFact::failure(provider, name.clone(), code);
                    }
                    tokio::time::sleep(retry::backoff_delay(self.backoff_base, attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    fn record_latency(&self, started: std::time::Instant) {
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.stats.latency_ms_sum.fetch_add(elapsed, Ordering::Relaxed);
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Health snapshot for this provider.
    pub fn health(&self) -> ProviderHealth {
        let completed = self.stats.completed.load(Ordering::Relaxed);
        let sum = self.stats.latency_ms_sum.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let avg_latency_ms = if completed > 0 {
            sum as f64 / completed as f64
        } else {
            0.0
        };
        ProviderHealth {
            breaker_state: self.breaker.state(),
            recent_error_rate: self.breaker.recent_error_rate(),
            avg_latency_ms,
        }
    }
}
