//! Per-provider token bucket.
//!
//! `limit` tokens refill continuously over `period`; an acquisition waits up
//! to the configured timeout for a token before failing. Tokens are not
//! reserved while waiting, so a cancelled caller never strands one.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Continuous-refill token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    acquire_timeout: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Build from provider configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.limit).max(1.0);
        let period_secs = u32::try_from(config.period_secs.max(1)).map_or(f64::MAX, f64::from);
        Self {
            capacity,
            refill_per_sec: capacity / period_secs,
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take a token, waiting up to the acquire timeout.
    ///
    /// Returns `false` if no token became available in time.
    pub async fn acquire(&self) -> bool {
        let deadline = Instant::now().checked_add(self.acquire_timeout);
        loop {
            match self.try_take() {
                Ok(()) => return true,
                Err(wait) => {
                    let Some(deadline) = deadline else { return false };
                    if Instant::now().checked_add(wait).is_none_or(|at| at > deadline) {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Take a token immediately, or report how long until one refills.
    fn try_take(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - state.tokens;
        Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: u32, period_secs: u64, acquire_timeout_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            period_secs,
            limit,
            acquire_timeout_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_limit_then_blocked() {
        let bucket = TokenBucket::new(&config(3, 60, 10));
        assert!(bucket.acquire().await);
        assert!(bucket.acquire().await);
        assert!(bucket.acquire().await);
        // Fourth token is 20s away; a 10ms budget cannot cover it.
        assert!(!bucket.acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let bucket = TokenBucket::new(&config(1, 1, 5));
        assert!(bucket.acquire().await);
        assert!(!bucket.acquire().await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bucket.acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_within_timeout() {
        let bucket = TokenBucket::new(&config(1, 1, 2_000));
        assert!(bucket.acquire().await);
        // Paused clock: the sleep inside acquire auto-advances past the
        // refill point and the second acquisition succeeds.
        assert!(bucket.acquire().await);
    }
}
