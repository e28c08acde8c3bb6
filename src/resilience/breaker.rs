//! Per-provider circuit breaker.
//!
//! Classic three-state machine over a sliding window of recent call
//! outcomes:
//!
//! - closed → open when the failure rate over the window exceeds the
//!   threshold and the window holds at least `min_calls` samples
//! - open → half-open after `open_secs`
//! - half-open admits up to `half_open_probes` calls; all succeeding closes
//!   the breaker, any failure reopens it and resets the timer
//!
//! Rejections while open are immediate and never reach the adapter.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;

/// Observable breaker state, reported by health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Calls flow through; outcomes feed the sliding window.
    Closed,
    /// Calls are rejected until the open duration elapses.
    Open,
    /// A bounded number of probe calls is admitted.
    HalfOpen,
}

impl BreakerState {
    /// Returns the string representation used in the health report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_admitted: u32,
    probes_succeeded: u32,
}

/// Sliding-window circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_rate: f64,
    min_calls: u32,
    window_size: usize,
    open_duration: Duration,
    probe_count: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Build from provider configuration.
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_rate: config.failure_rate,
            min_calls: config.min_calls,
            window_size: config.window.max(1),
            open_duration: Duration::from_secs(config.open_secs),
            probe_count: config.half_open_probes.max(1),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                probes_admitted: 0,
                probes_succeeded: 0,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// Transitions open → half-open when the open duration has elapsed, and
    /// counts half-open admissions against the probe budget.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.open_duration);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    inner.probes_admitted = 1;
                    inner.probes_succeeded = 0;
                    tracing::debug!("breaker half-open, probing");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.probes_admitted < self.probe_count {
                    inner.probes_admitted = inner.probes_admitted.saturating_add(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful adapter call.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                Self::push(&mut inner.window, true, self.window_size);
            }
            BreakerState::HalfOpen => {
                inner.probes_succeeded = inner.probes_succeeded.saturating_add(1);
                if inner.probes_succeeded >= self.probe_count {
                    inner.state = BreakerState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    tracing::info!("breaker closed after successful probes");
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed adapter call.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                Self::push(&mut inner.window, false, self.window_size);
                let samples = inner.window.len();
                let failures = inner.window.iter().filter(|ok| !**ok).count();
                let enough = u32::try_from(samples).unwrap_or(u32::MAX) >= self.min_calls;
                if enough && rate(failures, samples) > self.failure_rate {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        failures,
                        samples,
                        "breaker opened on failure rate"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!("breaker reopened by failed probe");
            }
            BreakerState::Open => {}
        }
    }

    fn push(window: &mut VecDeque<bool>, outcome: bool, cap: usize) {
        if window.len() >= cap {
            window.pop_front();
        }
        window.push_back(outcome);
    }

    /// Current state, for the health report.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Failure rate over the current window, in [0, 1].
    pub fn recent_error_rate(&self) -> f64 {
        let inner = self.inner.lock();
        let failures = inner.window.iter().filter(|ok| !**ok).count();
        rate(failures, inner.window.len())
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(failures: usize, samples: usize) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    failures as f64 / samples as f64
}
