//! Duplex channel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Channel Manager configuration: transport selection, reconnect policy,
/// keepalive, and the topics subscribed on every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Transport name: `"websocket"` or `"memory"`.
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on any single reconnect delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failures tolerated before auto-retry stops.
    #[serde(default = "default_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Interval between keepalive pings, in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Grace period after a missed ping before the connection is declared lost.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Topics subscribed when the session starts.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// Close code the server uses to signal an expired token.
    #[serde(default = "default_auth_close_code")]
    pub auth_close_code: u16,
}

impl RealtimeConfig {
    /// Base reconnect delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// Maximum reconnect delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    /// Keepalive ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    /// Keepalive timeout.
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_seconds)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            reconnect_base_delay_ms: default_base_delay(),
            reconnect_max_delay_ms: default_max_delay(),
            reconnect_max_attempts: default_max_attempts(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            topics: default_topics(),
            auth_close_code: default_auth_close_code(),
        }
    }
}

fn default_transport() -> String {
    "websocket".to_string()
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_topics() -> Vec<String> {
    vec!["notifications".to_string()]
}

fn default_auth_close_code() -> u16 {
    4401
}
