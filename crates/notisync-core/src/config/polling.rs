//! Polling fallback configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Periodic full-list refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Whether the polling fallback runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between full fetches.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl PollingConfig {
    /// Poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    120
}
