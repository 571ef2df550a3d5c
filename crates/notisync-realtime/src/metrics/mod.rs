//! Channel metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for one session's duplex channel.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Text frames received
    pub frames_received: AtomicU64,
    /// Events routed to the store
    pub events_applied: AtomicU64,
    /// Well-formed envelopes of unknown type
    pub events_ignored: AtomicU64,
    /// Payloads dropped as malformed
    pub malformed_dropped: AtomicU64,
    /// Transports successfully opened
    pub connections_opened: AtomicU64,
    /// Reconnect attempts scheduled
    pub reconnects_scheduled: AtomicU64,
    /// Client messages written to the transport
    pub messages_sent: AtomicU64,
    /// Keepalive pings sent
    pub pings_sent: AtomicU64,
}

impl ChannelMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn event_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn event_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Text frames received
    pub frames_received: u64,
    /// Events routed to the store
    pub events_applied: u64,
    /// Well-formed envelopes of unknown type
    pub events_ignored: u64,
    /// Payloads dropped as malformed
    pub malformed_dropped: u64,
    /// Transports successfully opened
    pub connections_opened: u64,
    /// Reconnect attempts scheduled
    pub reconnects_scheduled: u64,
    /// Client messages written to the transport
    pub messages_sent: u64,
    /// Keepalive pings sent
    pub pings_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ChannelMetrics::new();
        metrics.frame_received();
        metrics.frame_received();
        metrics.malformed();
        metrics.connection_opened();

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.malformed_dropped, 1);
        assert_eq!(snap.connections_opened, 1);
        assert_eq!(snap.events_applied, 0);
    }
}
