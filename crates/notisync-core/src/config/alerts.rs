//! On-screen alert configuration.

use serde::{Deserialize, Serialize};

/// Rules for which notifications raise an ephemeral alert and how long it stays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Lowest priority that may raise an alert: `"low"`, `"normal"`, `"high"`, `"urgent"`.
    #[serde(default = "default_min_priority")]
    pub min_priority: String,
    /// Notifications older than this (relative to when they are observed) never alert.
    #[serde(default = "default_recency_window")]
    pub recency_window_seconds: u64,
    /// Seconds an unpinned alert stays visible.
    #[serde(default = "default_display")]
    pub display_seconds: u64,
    /// Maximum simultaneously visible alerts.
    #[serde(default = "default_max_visible")]
    pub max_visible: usize,
    /// How often expired alerts are swept, in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_priority: default_min_priority(),
            recency_window_seconds: default_recency_window(),
            display_seconds: default_display(),
            max_visible: default_max_visible(),
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

fn default_min_priority() -> String {
    "high".to_string()
}

fn default_recency_window() -> u64 {
    300
}

fn default_display() -> u64 {
    8
}

fn default_max_visible() -> usize {
    5
}

fn default_sweep_interval() -> u64 {
    500
}
