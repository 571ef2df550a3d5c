//! Integration tests for channel lifecycle and polling repair.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{SlowSource, TestSession, created, eventually, notification};
use notisync_core::error::ErrorKind;
use notisync_core::types::token::SessionToken;
use notisync_realtime::connection::MemoryTransport;
use notisync_realtime::{ConnectionState, NotificationSession};
use notisync_source::FixtureNotificationSource;

#[tokio::test]
async fn test_resubscribes_exactly_once_after_reconnect() {
    let t = TestSession::new(vec![]);
    t.session.subscribe("user:42").unwrap();
    t.connect().await;
    eventually(|| t.transport.sent(0).len() == 2).await;

    t.transport.drop_connection();
    eventually(|| t.transport.connection_count() == 2 && t.transport.sent(1).len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sent = t.transport.sent(1);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent.iter().filter(|m| m.contains("\"user:42\"")).count(), 1);
    assert_eq!(sent.iter().filter(|m| m.contains("\"notifications\"")).count(), 1);

    t.session.disconnect().await;
}

#[tokio::test]
async fn test_polling_repairs_missed_events() {
    let t = TestSession::with_settings(vec![notification("a", 1)], |s| {
        s.polling_interval = Some(Duration::from_millis(100));
    });
    t.connect().await;
    assert_eq!(t.snapshot().unread_count, 1);

    t.transport.set_refuse(true);
    t.transport.drop_connection();

    // Changes the channel never delivers
    let mut server = t.source.items();
    server[0] = server[0].clone().with_read_at(chrono::Utc::now());
    server.insert(0, notification("b", 0));
    server.insert(0, notification("c", 0));
    t.source.set_items(server);

    eventually(|| {
        let snapshot = t.snapshot();
        snapshot.notifications.len() == 3 && snapshot.unread_count == 2
    })
    .await;
    assert!(helpers::count_consistent(&t.snapshot()));

    t.session.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_stops_all_updates() {
    let t = TestSession::with_settings(vec![notification("a", 1)], |s| {
        s.polling_interval = Some(Duration::from_millis(30));
    });
    t.connect().await;
    t.session.disconnect().await;

    assert_eq!(t.transport.close_code(0), Some(1000));
    assert!(!t.session.is_connected());

    let before = t.snapshot();
    let fetches = t.source.fetch_count();

    assert!(!t.push(created(&notification("late", 0))));
    t.source.push(notification("polled", 0));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let after = t.snapshot();
    assert_eq!(after.notifications, before.notifications);
    assert_eq!(after.unread_count, before.unread_count);
    assert_eq!(t.source.fetch_count(), fetches);
    assert_eq!(t.transport.connection_count(), 1);
}

#[tokio::test]
async fn test_auth_close_code_stops_sync() {
    let t = TestSession::with_settings(vec![], |s| {
        s.polling_interval = Some(Duration::from_millis(30));
    });
    t.connect().await;

    t.transport.close_connection(4401, "token expired");
    eventually(|| t.snapshot().auth_expired).await;

    let fetches = t.source.fetch_count();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(t.transport.connection_count(), 1);
    assert_eq!(t.source.fetch_count(), fetches);
    assert!(!t.session.is_connected());
    assert!(t.session.connect().await.is_err());

    t.session.reauthenticate("renewed").await.unwrap();
    eventually(|| t.session.status().state == ConnectionState::Open).await;
    assert_eq!(t.transport.token(1).as_deref(), Some("renewed"));
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_gives_up_then_manual_retry_reconnects() {
    let t = TestSession::new(vec![]);
    t.connect().await;

    t.transport.set_refuse(true);
    t.transport.drop_connection();
    eventually(|| t.session.status().exhausted).await;
    let attempts = t.transport.connect_attempts();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(t.transport.connect_attempts(), attempts);

    t.transport.set_refuse(false);
    t.session.retry_connection().unwrap();
    eventually(|| t.session.status().state == ConnectionState::Open).await;
    assert_eq!(t.session.status().attempt, 0);
    assert!(!t.session.status().exhausted);

    t.session.disconnect().await;
}

#[tokio::test]
async fn test_initial_load_walks_every_page() {
    let items = (0..7).map(|i| notification(&format!("n{i}"), i)).collect();
    let t = TestSession::new(items);
    t.connect().await;

    let snapshot = t.snapshot();
    assert_eq!(snapshot.notifications.len(), 7);
    assert_eq!(snapshot.unread_count, 7);
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_during_initial_load_leaves_store_untouched() {
    let fixture = Arc::new(FixtureNotificationSource::new(vec![notification("a", 1)]));
    let transport = MemoryTransport::new();
    let session = Arc::new(
        NotificationSession::new(
            Arc::new(SlowSource {
                inner: fixture,
                delay: Duration::from_millis(100),
            }),
            Arc::new(transport.clone()),
            SessionToken::new("test-token"),
            helpers::settings(),
        )
        .expect("session"),
    );

    let connecting = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.disconnect().await;

    let err = connecting.await.expect("join").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let after = session.snapshot();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.snapshot(), after);
    assert!(after.notifications.is_empty());
    assert!(!session.is_connected());
    assert_eq!(transport.connect_attempts(), 0);
}
