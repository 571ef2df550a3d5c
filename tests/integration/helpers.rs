//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use notisync_core::result::AppResult;
use notisync_core::types::id::NotificationId;
use notisync_core::types::pagination::{PageRequest, PageResponse};
use notisync_core::types::token::SessionToken;
use notisync_entity::{Notification, NotificationPriority};
use notisync_realtime::channel::{ConnectionState, ReconnectPolicy};
use notisync_realtime::connection::heartbeat::HeartbeatConfig;
use notisync_realtime::connection::{ChannelSettings, MemoryTransport};
use notisync_realtime::notification::AlertPolicy;
use notisync_realtime::polling::FetchSettings;
use notisync_realtime::{NotificationSession, SessionSettings, SessionSnapshot};
use notisync_source::{FixtureNotificationSource, NotificationSource};

/// Settings with fast reconnects and polling disabled.
pub fn settings() -> SessionSettings {
    SessionSettings {
        channel: ChannelSettings {
            url: "memory://notifications".to_string(),
            policy: ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(40), 3),
            heartbeat: HeartbeatConfig {
                ping_interval: Duration::from_secs(30),
                ping_timeout: Duration::from_secs(10),
            },
            auth_close_code: 4401,
        },
        fetch: FetchSettings {
            page_size: 2,
            max_pages: 50,
        },
        polling_interval: None,
        alerts: AlertPolicy::default(),
        sweep_interval: Duration::from_millis(20),
        topics: vec!["notifications".to_string()],
    }
}

/// Fixture backend that sleeps before serving every page.
#[derive(Debug)]
pub struct SlowSource {
    pub inner: Arc<FixtureNotificationSource>,
    pub delay: Duration,
}

#[async_trait]
impl NotificationSource for SlowSource {
    async fn fetch_page(&self, page: &PageRequest) -> AppResult<PageResponse<Notification>> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_page(page).await
    }

    async fn mark_read(&self, id: &NotificationId) -> AppResult<()> {
        self.inner.mark_read(id).await
    }

    async fn mark_all_read(&self) -> AppResult<()> {
        self.inner.mark_all_read().await
    }

    async fn delete(&self, id: &NotificationId) -> AppResult<()> {
        self.inner.delete(id).await
    }
}

/// A session wired to a fixture backend and an in-memory channel.
pub struct TestSession {
    /// Authoritative backend list
    pub source: Arc<FixtureNotificationSource>,
    /// Server side of the channel
    pub transport: MemoryTransport,
    /// Session under test
    pub session: NotificationSession,
}

impl TestSession {
    /// Create a session with default test settings
    pub fn new(items: Vec<Notification>) -> Self {
        Self::with_settings(items, |_| {})
    }

    /// Create a session after adjusting the test settings
    pub fn with_settings(items: Vec<Notification>, adjust: impl FnOnce(&mut SessionSettings)) -> Self {
        let mut settings = settings();
        adjust(&mut settings);

        let source = Arc::new(FixtureNotificationSource::new(items));
        let transport = MemoryTransport::new();
        let session = NotificationSession::new(
            source.clone(),
            Arc::new(transport.clone()),
            SessionToken::new("test-token"),
            settings,
        )
        .expect("session");

        Self {
            source,
            transport,
            session,
        }
    }

    /// Connect and wait until the channel is open and subscribed
    pub async fn connect(&self) {
        self.session.connect().await.expect("connect");
        let index = self.transport.connection_count().saturating_sub(1);
        eventually(|| {
            self.session.status().state == ConnectionState::Open
                && !self.transport.sent(index).is_empty()
        })
        .await;
    }

    /// Push a server envelope on the newest connection
    pub fn push(&self, envelope: Value) -> bool {
        self.transport.push(envelope.to_string())
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }
}

/// Notification created `minutes_ago` minutes before now
pub fn notification(id: &str, minutes_ago: i64) -> Notification {
    Notification::new(
        id,
        format!("Title {id}"),
        "",
        Utc::now() - chrono::Duration::minutes(minutes_ago),
    )
}

/// High-priority notification created `minutes_ago` minutes before now
pub fn urgent(id: &str, minutes_ago: i64) -> Notification {
    notification(id, minutes_ago).with_priority(NotificationPriority::Urgent)
}

/// `created` envelope for `n`
pub fn created(n: &Notification) -> Value {
    let mut value = serde_json::to_value(n).expect("serialize notification");
    value["type"] = json!("created");
    value
}

/// `read` envelope
pub fn read(id: &str) -> Value {
    json!({ "type": "read", "id": id, "readAt": Utc::now() })
}

/// `deleted` envelope
pub fn deleted(id: &str) -> Value {
    json!({ "type": "deleted", "id": id })
}

/// Whether the snapshot's count agrees with its list
pub fn count_consistent(snapshot: &SessionSnapshot) -> bool {
    snapshot.unread_count == snapshot.notifications.iter().filter(|n| n.is_unread()).count()
}

/// Poll `check` until it holds, failing after two seconds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
