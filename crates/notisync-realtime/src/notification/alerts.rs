//! On-screen alert queue.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use notisync_core::config::AlertConfig;
use notisync_core::types::id::{AlertId, NotificationId};
use notisync_entity::{Notification, NotificationPriority};

/// An ephemeral alert raised for one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert ID.
    pub id: AlertId,
    /// Notification that raised it.
    pub notification_id: NotificationId,
    /// Display title.
    pub title: String,
    /// Display body.
    pub body: String,
    /// Notification priority.
    pub priority: NotificationPriority,
    /// Pinned alerts never auto-dismiss.
    pub pinned: bool,
    /// Start of the display timer.
    pub shown_at: DateTime<Utc>,
}

/// Which notifications alert, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Lowest priority that alerts.
    pub min_priority: NotificationPriority,
    /// Maximum age, at observation time, of a notification that alerts.
    pub recency_window: Duration,
    /// How long an unpinned alert stays visible.
    pub display: Duration,
    /// Maximum simultaneously visible alerts.
    pub max_visible: usize,
}

impl AlertPolicy {
    /// Build from the `[alerts]` section.
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            min_priority: NotificationPriority::from_str_value(&config.min_priority),
            recency_window: Duration::seconds(config.recency_window_seconds as i64),
            display: Duration::seconds(config.display_seconds as i64),
            max_visible: config.max_visible.max(1),
        }
    }

    /// Whether `notification`, observed at `now`, should raise an alert.
    ///
    /// It must be unread, not yet alerted, at least `min_priority`, and
    /// created no longer than `recency_window` before `now`. Timestamps in
    /// the future count as recent.
    pub fn qualifies(&self, notification: &Notification, now: DateTime<Utc>) -> bool {
        !notification.alerted
            && !notification.read
            && notification.priority >= self.min_priority
            && now.signed_duration_since(notification.created_at) <= self.recency_window
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from_config(&AlertConfig::default())
    }
}

/// Visible alerts, oldest first.
#[derive(Debug, Clone)]
pub struct AlertQueue {
    policy: AlertPolicy,
    visible: Vec<Alert>,
}

impl AlertQueue {
    /// Creates an empty queue.
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            visible: Vec::new(),
        }
    }

    /// The alert rules.
    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Visible alerts, oldest first.
    pub fn visible(&self) -> &[Alert] {
        &self.visible
    }

    /// Number of visible alerts.
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// Whether no alert is visible.
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Show an alert for `notification`. When full, the oldest unpinned
    /// alert (or the oldest alert, if all are pinned) makes room.
    pub fn push(&mut self, notification: &Notification, now: DateTime<Utc>) -> AlertId {
        while self.visible.len() >= self.policy.max_visible {
            let evict = self.visible.iter().position(|a| !a.pinned).unwrap_or(0);
            self.visible.remove(evict);
        }

        let alert = Alert {
            id: AlertId::new(),
            notification_id: notification.id.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            priority: notification.priority,
            pinned: false,
            shown_at: now,
        };
        let id = alert.id;
        self.visible.push(alert);
        id
    }

    /// Keep an alert on screen until unpinned or dismissed.
    pub fn pin(&mut self, id: AlertId) -> bool {
        match self.visible.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.pinned = true;
                true
            }
            None => false,
        }
    }

    /// Release a pin; the display timer restarts at `now`.
    pub fn unpin(&mut self, id: AlertId, now: DateTime<Utc>) -> bool {
        match self.visible.iter_mut().find(|a| a.id == id && a.pinned) {
            Some(alert) => {
                alert.pinned = false;
                alert.shown_at = now;
                true
            }
            None => false,
        }
    }

    /// Remove an alert.
    pub fn dismiss(&mut self, id: AlertId) -> bool {
        let before = self.visible.len();
        self.visible.retain(|a| a.id != id);
        self.visible.len() != before
    }

    /// Remove alerts raised by `notification_id`.
    pub fn dismiss_for(&mut self, notification_id: &NotificationId) -> bool {
        let before = self.visible.len();
        self.visible.retain(|a| &a.notification_id != notification_id);
        self.visible.len() != before
    }

    /// Keep only alerts whose notification satisfies `keep`.
    pub fn retain_notifications(&mut self, keep: impl Fn(&NotificationId) -> bool) -> bool {
        let before = self.visible.len();
        self.visible.retain(|a| keep(&a.notification_id));
        self.visible.len() != before
    }

    /// Remove unpinned alerts whose display time has elapsed at `now`.
    ///
    /// Returns the removed alert ids.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<AlertId> {
        let display = self.policy.display;
        let mut expired = Vec::new();
        self.visible.retain(|a| {
            let keep = a.pinned || now.signed_duration_since(a.shown_at) < display;
            if !keep {
                expired.push(a.id);
            }
            keep
        });
        expired
    }
}
