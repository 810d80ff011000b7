//! Engine configuration.

use std::time::Duration;

use ohlcv_core::{DataError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Default number of concurrently active fetch sequences.
pub const DEFAULT_MAX_CONCURRENT: usize = 50;
/// Default total attempts per request, including the first.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default per-call network timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters of a [`ParallelFetchEngine`](crate::ParallelFetchEngine).
///
/// Every field must be positive; [`EngineConfig::validate`] enforces this and
/// the engine refuses to start otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the admission gate.
    pub max_concurrent: usize,
    /// Total attempts per request, including the first.
    pub retry_attempts: u32,
    /// Backoff before retry `i` (0-indexed) is `retry_base_delay * 2^i`.
    pub retry_base_delay: Duration,
    /// Deadline for a single provider call.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admission gate capacity.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the total number of attempts per request.
    #[must_use]
    pub const fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// Set the base backoff delay.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that every parameter is positive and that `max_concurrent`
    /// fits in the admission gate.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(DataError::InvalidConfiguration(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(DataError::InvalidConfiguration(format!(
                "max_concurrent must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.retry_attempts == 0 {
            return Err(DataError::InvalidConfiguration(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_base_delay.is_zero() {
            return Err(DataError::InvalidConfiguration(
                "retry_base_delay must be positive".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(DataError::InvalidConfiguration(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sleep before retry number `retry_index` (0 for the first retry).
    #[must_use]
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        2u32.checked_pow(retry_index)
            .map_or(Duration::MAX, |factor| {
                self.retry_base_delay.saturating_mul(factor)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent, 50);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
        assert!(
            config
                .with_max_concurrent(Semaphore::MAX_PERMITS)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let base = EngineConfig::new();
        for config in [
            base.clone().with_max_concurrent(0),
            base.clone().with_max_concurrent(usize::MAX),
            base.clone().with_max_concurrent(Semaphore::MAX_PERMITS + 1),
            base.clone().with_retry_attempts(0),
            base.clone().with_retry_base_delay(Duration::ZERO),
            base.with_timeout(Duration::ZERO),
        ] {
            assert!(matches!(
                config.validate(),
                Err(DataError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let config = EngineConfig::new().with_retry_base_delay(Duration::from_millis(500));
        assert_eq!(config.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(40), Duration::MAX);
    }
}
