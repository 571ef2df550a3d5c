//! Keepalive tracking for the duplex connection.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use notisync_core::config::RealtimeConfig;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Grace period after a missed interval before the connection is dead
    pub ping_timeout: Duration,
}

impl HeartbeatConfig {
    /// Build from the `[realtime]` section.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// Tracks when the peer was last heard from.
///
/// Any inbound frame counts as proof of life. The connection is dead once
/// nothing arrived for `ping_interval + ping_timeout`.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_seen: Instant,
}

impl Heartbeat {
    /// Start tracking from now.
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_seen: Instant::now(),
        }
    }

    /// Record inbound traffic.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Whether the peer has been silent too long.
    pub fn is_expired(&self) -> bool {
        self.last_seen.elapsed() > self.config.ping_interval + self.config.ping_timeout
    }

    /// Ping ticker whose first tick is one interval from now.
    pub fn ticker(&self) -> Interval {
        let mut interval = time::interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }
}
