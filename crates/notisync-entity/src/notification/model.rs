//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notisync_core::types::id::NotificationId;

use super::kind::NotificationKind;
use super::priority::NotificationPriority;

/// A notification as delivered by the backend.
///
/// Field names follow the backend's camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique, stable identifier.
    pub id: NotificationId,
    /// What the notification is about.
    #[serde(default)]
    pub kind: NotificationKind,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Display body.
    #[serde(default)]
    pub body: String,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the user has read this notification.
    #[serde(default)]
    pub read: bool,
    /// When the notification was read.
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    /// Foreign reference used for navigation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_object_id: Option<String>,
    /// Server-assigned priority.
    #[serde(default)]
    pub priority: NotificationPriority,
    /// Set once an on-screen alert has been raised for this notification.
    /// Local to this client; never sent to or read from the backend.
    #[serde(skip)]
    pub alerted: bool,
}

impl Notification {
    /// Create an unread notification with default kind and priority.
    pub fn new(
        id: impl Into<NotificationId>,
        title: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NotificationKind::default(),
            title: title.into(),
            body: body.into(),
            created_at,
            read: false,
            read_at: None,
            related_object_id: None,
            priority: NotificationPriority::default(),
            alerted: false,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as already read at `at`.
    pub fn with_read_at(mut self, at: DateTime<Utc>) -> Self {
        self.read = true;
        self.read_at = Some(at);
        self
    }

    /// Check if the notification has not been read.
    pub fn is_unread(&self) -> bool {
        !self.read
    }

    /// Fold a newer copy of the same notification into this one.
    ///
    /// Display fields come from `incoming`. The read flag is sticky: once
    /// either side is read the result is read, keeping the earliest known
    /// `read_at`. The local alert marker is kept.
    pub fn merge_from(&mut self, incoming: Notification) {
        let was_read = self.read;
        let previous_read_at = self.read_at;
        let alerted = self.alerted;

        *self = incoming;

        if was_read {
            self.read = true;
            self.read_at = match (previous_read_at, self.read_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        self.alerted = alerted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn test_deserialize_backend_shape() {
        let json = r#"{
            "id": 17,
            "kind": "payment",
            "title": "Milestone released",
            "body": "Escrow released 250.00",
            "createdAt": "2026-03-01T12:00:00Z",
            "read": false,
            "readAt": null,
            "relatedObjectId": "job-9",
            "priority": "high"
        }"#;
        let n: Notification = serde_json::from_str(json).expect("parse");
        assert_eq!(n.id.as_str(), "17");
        assert_eq!(n.kind, NotificationKind::Payment);
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.related_object_id.as_deref(), Some("job-9"));
        assert!(n.is_unread());
        assert!(!n.alerted);
    }

    #[test]
    fn test_alert_marker_not_serialized() {
        let mut n = Notification::new("a", "t", "b", at(0));
        n.alerted = true;
        let json = serde_json::to_value(&n).expect("serialize");
        assert!(json.get("alerted").is_none());
        assert_eq!(json["createdAt"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn test_merge_never_unreads() {
        let mut local = Notification::new("a", "old", "b", at(0)).with_read_at(at(5));
        let incoming = Notification::new("a", "new title", "b", at(0));
        local.merge_from(incoming);
        assert!(local.read);
        assert_eq!(local.read_at, Some(at(5)));
        assert_eq!(local.title, "new title");
    }

    #[test]
    fn test_merge_takes_incoming_read() {
        let mut local = Notification::new("a", "t", "b", at(0));
        local.alerted = true;
        local.merge_from(Notification::new("a", "t", "b", at(0)).with_read_at(at(3)));
        assert!(local.read);
        assert_eq!(local.read_at, Some(at(3)));
        assert!(local.alerted);
    }

    #[test]
    fn test_merge_keeps_earliest_read_at() {
        let mut local = Notification::new("a", "t", "b", at(0)).with_read_at(at(9));
        local.merge_from(Notification::new("a", "t", "b", at(0)).with_read_at(at(4)));
        assert_eq!(local.read_at, Some(at(4)));
    }
}
