//! Failure classification and retry backoff.
//!
//! Transport and upstream errors are folded into the stable failure code
//! set here; the retry loop consults [`is_transient`] so that only failures
//! with a chance of clearing (timeouts, 5xx, connection resets, 429) are
//! attempted again.

use std::time::Duration;

use rand::Rng;

use crate::providers::ProviderError;
use crate::types::FailureCode;

/// Map an adapter error to its failure code.
pub fn classify(error: &ProviderError) -> FailureCode {
    match error {
        ProviderError::Request(e) if e.is_timeout() => FailureCode::Timeout,
        ProviderError::Request(_) => FailureCode::ConnectionReset,
        ProviderError::Parse(_) => FailureCode::ParseError,
        ProviderError::HttpStatus { status, .. } if *status >= 500 => FailureCode::Upstream5xx,
        ProviderError::HttpStatus { .. } => FailureCode::Upstream4xx,
    }
}

/// Whether a failed call is worth retrying.
///
/// 4xx answers are final, with the single exception of 429.
pub fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::Request(_) => true,
        ProviderError::Parse(_) => false,
        ProviderError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
    }
}

/// Exponential backoff with jitter: `base * 2^attempt + [0, base)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis().min(u128::from(u64::MAX));
    let base_ms = u64::try_from(base_ms).unwrap_or(u64::MAX);
    let scaled = 2u64
        .checked_pow(attempt)
        .and_then(|factor| base_ms.checked_mul(factor))
        .unwrap_or(u64::MAX);
    let jitter = if base_ms > 0 {
        rand::thread_rng().gen_range(0..base_ms)
    } else {
        0
    };
    Duration::from_millis(scaled.saturating_add(jitter))
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> ProviderError {
        ProviderError::HttpStatus {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(&status_error(500)), FailureCode::Upstream5xx);
        assert_eq!(classify(&status_error(404)), FailureCode::Upstream4xx);
        assert_eq!(
            classify(&ProviderError::Parse("bad".to_owned())),
            FailureCode::ParseError
        );
    }

    #[test]
    fn test_transience() {
        assert!(is_transient(&status_error(500)));
        assert!(is_transient(&status_error(503)));
        assert!(is_transient(&status_error(429)));
        assert!(!is_transient(&status_error(404)));
        assert!(!is_transient(&status_error(400)));
        assert!(!is_transient(&ProviderError::Parse("bad".to_owned())));
    }

    #[test]
    fn test_backoff_grows_exponentially_with_bounded_jitter() {
        let base = Duration::from_millis(100);
        for attempt in 0..4 {
            let delay = backoff_delay(base, attempt);
            let floor = 100u64.saturating_mul(2u64.pow(attempt));
            assert!(delay >= Duration::from_millis(floor));
            assert!(delay < Duration::from_millis(floor.saturating_add(100)));
        }
    }

    #[test]
    fn test_backoff_zero_base_is_zero() {
        assert_eq!(backoff_delay(Duration::ZERO, 3), Duration::ZERO);
    }
}
