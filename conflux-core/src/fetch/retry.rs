use std::time::Duration;

use conflux_config::RetrySettings;
use rand::Rng;

/// Exponential backoff with a hard cap and random jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (`limit + 1` attempts total).
    pub limit: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            limit: settings.limit,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: Duration::from_millis(settings.jitter_ms),
        }
    }

    /// No retries at all; the initial attempt is the only one.
    pub fn none() -> Self {
        Self {
            limit: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Backoff before retry `attempt` (1-based): `base * 2^(attempt-1)`
    /// capped at `max_delay`, plus uniform jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if self.jitter.is_zero() {
            return scaled;
        }
        let jitter_ms =
            rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        scaled + Duration::from_millis(jitter_ms)
    }

    /// Default retry predicate for HTTP statuses: transient server-side
    /// conditions retry, all other client errors give up immediately.
    pub fn retryable_status(status: u16) -> bool {
        matches!(status, 500..=599 | 408 | 429)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            limit: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
        assert_eq!(policy.delay(10), Duration::from_millis(350));
    }

    #[test]
    fn retry_predicate_covers_transient_statuses() {
        assert!(RetryPolicy::retryable_status(503));
        assert!(RetryPolicy::retryable_status(408));
        assert!(RetryPolicy::retryable_status(429));
        assert!(!RetryPolicy::retryable_status(404));
        assert!(!RetryPolicy::retryable_status(403));
        assert!(!RetryPolicy::retryable_status(200));
    }
}
