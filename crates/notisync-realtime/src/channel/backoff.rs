//! Exponential reconnect backoff.

use std::time::Duration;

use notisync_core::config::RealtimeConfig;

/// Reconnect schedule: `base * 2^(n-1)` for the n-th consecutive failure,
/// capped at `max_delay`, with no attempt scheduled past `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy.
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Build from the `[realtime]` section.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(
            config.base_delay(),
            config.max_delay(),
            config.reconnect_max_attempts,
        )
    }

    /// Delay before retrying after `attempt` consecutive failures, or
    /// `None` once the attempt cap is exceeded.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}
