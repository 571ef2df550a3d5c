//! Integration tests for priority alerts.

mod helpers;

use std::time::Duration;

use helpers::{TestSession, created, deleted, eventually, notification, urgent};

#[tokio::test]
async fn test_only_recent_priority_notifications_alert() {
    let t = TestSession::new(vec![urgent("old", 30), urgent("fresh", 1), notification("plain", 0)]);
    t.connect().await;

    let alerts = t.snapshot().alerts;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].notification_id.as_str(), "fresh");

    // A replayed stale event is not an alert
    t.push(created(&urgent("replayed", 60)));
    t.push(created(&urgent("new", 0)));
    eventually(|| t.snapshot().notifications.len() == 5).await;

    let ids: Vec<_> = t
        .snapshot()
        .alerts
        .iter()
        .map(|a| a.notification_id.to_string())
        .collect();
    assert_eq!(ids, vec!["fresh", "new"]);
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_notification_alerts_once() {
    let t = TestSession::new(vec![urgent("a", 0)]);
    t.connect().await;
    let alert = t.snapshot().alerts[0].id;
    assert!(t.session.dismiss_alert(alert));

    t.push(created(&urgent("a", 0)));
    t.session.refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(t.snapshot().alerts.is_empty());
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_alerts_expire_unless_pinned() {
    let t = TestSession::with_settings(vec![], |s| {
        s.alerts.display = chrono::Duration::milliseconds(80);
    });
    t.connect().await;

    t.push(created(&urgent("a", 0)));
    t.push(created(&urgent("b", 0)));
    eventually(|| t.snapshot().alerts.len() == 2).await;
    let pinned = t.snapshot().alerts[1].id;
    assert!(t.session.pin_alert(pinned));

    eventually(|| t.snapshot().alerts.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(t.snapshot().alerts[0].id, pinned);

    assert!(t.session.unpin_alert(pinned));
    eventually(|| t.snapshot().alerts.is_empty()).await;
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_deleted_notification_drops_alert() {
    let t = TestSession::new(vec![]);
    t.connect().await;

    t.push(created(&urgent("a", 0)));
    eventually(|| t.snapshot().alerts.len() == 1).await;
    t.push(deleted("a"));
    eventually(|| t.snapshot().alerts.is_empty()).await;
    assert!(t.snapshot().notifications.is_empty());
    t.session.disconnect().await;
}
