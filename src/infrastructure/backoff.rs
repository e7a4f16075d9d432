//! Exponential backoff with jitter.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::config::RetryConfig;

/// Retry delay state. Each failure grows the delay by the configured
/// multiplier up to the maximum; a success resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    current_delay_ms: u64,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            config: config.clone(),
            current_delay_ms: config.initial_delay_ms,
            failures: 0,
        }
    }

    /// Return the delay before the next attempt and advance the state.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let base_delay = Duration::from_millis(self.current_delay_ms);
        let delay = base_delay + Duration::from_millis(Self::jitter_ms(base_delay));

        let next = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next.min(self.config.max_delay_ms);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.current_delay_ms = self.config.initial_delay_ms;
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    // Up to 20% of the base delay.
    fn jitter_ms(base_delay: Duration) -> u64 {
        let jitter_range_ms = (base_delay.as_millis() as u64) / 5;
        if jitter_range_ms == 0 {
            return 0;
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        u64::from(nanos) % (jitter_range_ms + 1)
    }
}
