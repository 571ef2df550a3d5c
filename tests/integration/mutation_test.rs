//! Integration tests for optimistic mutations and store consistency.

mod helpers;

use helpers::{TestSession, count_consistent, created, deleted, eventually, notification, read};
use notisync_core::error::ErrorKind;

#[tokio::test]
async fn test_mark_all_read_rollback_restores_exact_state() {
    let items = vec![
        notification("a", 1),
        notification("b", 2).with_read_at(chrono::Utc::now()),
        notification("c", 3),
    ];
    let t = TestSession::new(items);
    t.session.refresh().await.unwrap();
    t.source.fail_mutations(Some(ErrorKind::ExternalService));

    let before = t.snapshot();
    let err = t.session.mark_all_read().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExternalService);

    let after = t.snapshot();
    assert_eq!(after.notifications, before.notifications);
    assert_eq!(after.unread_count, 2);
    assert_eq!(after.errors.len(), 1);
    assert_eq!(after.errors[0].operation, "mark_all_read");
    assert!(!after.auth_expired);
}

#[tokio::test]
async fn test_remove_rollback_restores_position() {
    let t = TestSession::new(vec![notification("a", 1), notification("b", 2), notification("c", 3)]);
    t.session.refresh().await.unwrap();
    t.source.fail_mutations(Some(ErrorKind::Conflict));

    assert!(t.session.remove("b").await.is_err());
    let ids: Vec<_> = t
        .snapshot()
        .notifications
        .iter()
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_rollback_is_visible_to_watchers() {
    let t = TestSession::new(vec![notification("a", 1)]);
    t.session.refresh().await.unwrap();
    t.source.fail_mutations(Some(ErrorKind::ExternalService));
    let mut rx = t.session.watch();
    let _ = rx.borrow_and_update();

    assert!(t.session.mark_read("a").await.is_err());
    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow_and_update().clone();
    assert_eq!(latest.unread_count, 1);
    assert_eq!(latest.errors.len(), 1);
}

#[tokio::test]
async fn test_successful_mutations_reach_backend() {
    let t = TestSession::new(vec![notification("a", 1), notification("b", 2)]);
    t.session.refresh().await.unwrap();

    assert!(t.session.mark_read("a").await.unwrap());
    assert!(!t.session.mark_read("a").await.unwrap());
    assert!(t.session.remove("b").await.unwrap());
    assert!(!t.session.remove("missing").await.unwrap());

    let server = t.source.items();
    assert_eq!(server.len(), 1);
    assert!(server[0].read);
    assert_eq!(t.snapshot().unread_count, 0);
}

#[tokio::test]
async fn test_unread_count_matches_list_across_operations() {
    let t = TestSession::new(vec![notification("a", 5), notification("b", 4)]);
    t.connect().await;
    let mut rx = t.session.watch();
    let mut seen = Vec::new();

    t.push(created(&notification("c", 0)));
    t.push(created(&notification("c", 0)));
    t.push(read("a"));
    t.push(read("a"));
    t.push(deleted("b"));
    t.push(deleted("never-existed"));
    eventually(|| {
        let s = t.snapshot();
        s.notifications.len() == 2 && s.unread_count == 1
    })
    .await;
    if rx.has_changed().unwrap_or(false) {
        seen.push(rx.borrow_and_update().clone());
    }

    t.session.mark_all_read().await.unwrap();
    seen.push(t.snapshot());
    t.source.push(notification("d", 0));
    t.session.refresh().await.unwrap();
    seen.push(t.snapshot());

    assert!(seen.iter().all(count_consistent));
    assert_eq!(t.snapshot().unread_count, 1);
    t.session.disconnect().await;
}

#[tokio::test]
async fn test_unauthorized_mutation_requires_reauthentication() {
    let t = TestSession::new(vec![notification("a", 1)]);
    t.connect().await;
    t.source.fail_mutations(Some(ErrorKind::Authentication));

    assert!(t.session.mark_read("a").await.is_err());
    let snapshot = t.snapshot();
    assert!(snapshot.auth_expired);
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.unread_count, 1);
    assert!(!t.session.is_connected());
}
