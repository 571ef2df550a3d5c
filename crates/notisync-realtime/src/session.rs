//! Notification session: the subscribable facade bound to one
//! authenticated session.
//!
//! A [`NotificationSession`] owns the store, the alert queue, the Channel
//! Manager, the poller and the alert sweeper. Every state change is applied
//! and published as one step under a single lock, so a
//! [`SessionSnapshot`] never shows the list and the unread count out of
//! step.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notisync_core::config::AppConfig;
use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;
use notisync_core::types::id::{AlertId, ErrorId, NotificationId};
use notisync_core::types::token::SessionToken;
use notisync_entity::Notification;
use notisync_source::NotificationSource;

use crate::channel::ChannelStatus;
use crate::connection::{ChannelListener, ChannelManager, ChannelSettings, Transport};
use crate::message::ServerEvent;
use crate::metrics::{ChannelMetrics, MetricsSnapshot};
use crate::notification::{
    Alert, AlertPolicy, AlertQueue, Mutation, NotificationStore, OptimisticTarget, Undo,
    run_optimistic,
};
use crate::polling::{FetchSettings, PollSink, Poller};

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Channel Manager settings.
    pub channel: ChannelSettings,
    /// Page size and limit for full fetches.
    pub fetch: FetchSettings,
    /// Polling interval, or `None` to disable polling.
    pub polling_interval: Option<Duration>,
    /// Alert rules.
    pub alerts: AlertPolicy,
    /// How often expired alerts are swept.
    pub sweep_interval: Duration,
    /// Topics subscribed on every connection.
    pub topics: Vec<String>,
}

impl SessionSettings {
    /// Build from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            channel: ChannelSettings::from_config(config),
            fetch: FetchSettings::from_config(config),
            polling_interval: config.polling.enabled.then(|| config.polling.interval()),
            alerts: AlertPolicy::from_config(&config.alerts),
            sweep_interval: Duration::from_millis(config.alerts.sweep_interval_ms),
            topics: config.realtime.topics.clone(),
        }
    }
}

/// A failed mutation shown to the user until dismissed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfacedError {
    /// Error ID, for dismissal.
    pub id: ErrorId,
    /// Operation that failed.
    pub operation: String,
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// When it failed.
    pub at: DateTime<Utc>,
}

impl SurfacedError {
    fn new(operation: &str, error: &AppError) -> Self {
        Self {
            id: ErrorId::new(),
            operation: operation.to_string(),
            kind: error.kind,
            message: error.message.clone(),
            at: Utc::now(),
        }
    }
}

/// Consistent view of the session, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Incremented on every published change.
    pub version: u64,
    /// Held notifications, in display order.
    pub notifications: Vec<Notification>,
    /// Unread notifications among `notifications`.
    pub unread_count: usize,
    /// Channel status.
    pub connection: ChannelStatus,
    /// Visible alerts, oldest first.
    pub alerts: Vec<Alert>,
    /// Undismissed mutation failures.
    pub errors: Vec<SurfacedError>,
    /// The token was rejected; call `reauthenticate`.
    pub auth_expired: bool,
}

#[derive(Debug)]
struct SessionState {
    store: NotificationStore,
    alerts: AlertQueue,
    connection: ChannelStatus,
    errors: Vec<SurfacedError>,
    auth_expired: bool,
    version: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            version: self.version,
            notifications: self.store.items().to_vec(),
            unread_count: self.store.unread_count(),
            connection: self.connection,
            alerts: self.alerts.visible().to_vec(),
            errors: self.errors.clone(),
            auth_expired: self.auth_expired,
        }
    }

    /// Alert for every held notification that qualifies, oldest first.
    fn raise_alerts(&mut self, now: DateTime<Utc>) {
        let policy = self.alerts.policy();
        let fresh: Vec<Notification> = self
            .store
            .items()
            .iter()
            .rev()
            .filter(|n| policy.qualifies(n, now))
            .cloned()
            .collect();

        for notification in &fresh {
            self.alerts.push(notification, now);
            self.store.mark_alerted(&notification.id);
            info!(notification_id = %notification.id, "Alert raised");
        }
    }
}

struct SessionShared {
    source: Arc<dyn NotificationSource>,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<SessionSnapshot>,
    lifecycle: Mutex<Option<CancellationToken>>,
}

impl SessionShared {
    /// Apply `f` and publish the result.
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let result = f(&mut state);
        state.version += 1;
        self.snapshots.send_replace(state.snapshot());
        result
    }

    /// Apply `f` and publish only if it reports a change.
    fn update_if(&self, f: impl FnOnce(&mut SessionState) -> bool) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let changed = f(&mut state);
        if changed {
            state.version += 1;
            self.snapshots.send_replace(state.snapshot());
        }
        changed
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    fn apply_event(&self, event: ServerEvent) {
        let now = Utc::now();
        self.update(|s| match event {
            ServerEvent::Created(notification) => {
                s.store.upsert(notification);
                s.raise_alerts(now);
            }
            ServerEvent::Read { id, read_at } => {
                s.store.mark_read(&id, read_at.unwrap_or(now));
            }
            ServerEvent::Deleted { id } => {
                s.store.remove(&id);
                s.alerts.dismiss_for(&id);
            }
        });
    }

    fn apply_snapshot(&self, items: Vec<Notification>) {
        let now = Utc::now();
        self.update(|s| {
            s.store.replace_all(items);
            let store = &s.store;
            s.alerts.retain_notifications(|id| store.contains(id));
            s.raise_alerts(now);
        });
    }

    /// Tear down channel and polling and flag the session for
    /// re-authentication.
    fn expire_auth(&self, reason: &str) {
        warn!(reason = %reason, "Session token rejected; stopping sync until reauthentication");
        self.update(|s| {
            s.auth_expired = true;
            s.connection = ChannelStatus::default();
        });
        if let Some(cancel) = self
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            cancel.cancel();
        }
    }
}

#[async_trait]
impl OptimisticTarget for SessionShared {
    fn apply_local(&self, mutation: &Mutation) -> Undo {
        self.update(|s| {
            let undo = mutation.apply(&mut s.store, Utc::now());
            if let (Mutation::Remove(id), false) = (mutation, undo.is_noop()) {
                s.alerts.dismiss_for(id);
            }
            undo
        })
    }

    async fn commit_remote(&self, mutation: &Mutation) -> AppResult<()> {
        match mutation {
            Mutation::MarkRead(id) => self.source.mark_read(id).await,
            Mutation::MarkAllRead => self.source.mark_all_read().await,
            Mutation::Remove(id) => self.source.delete(id).await,
        }
    }

    fn rollback(&self, mutation: &Mutation, undo: Undo, error: &AppError) {
        self.update(|s| {
            undo.revert(&mut s.store);
            if !error.is_unauthorized() {
                s.errors.push(SurfacedError::new(mutation.label(), error));
            }
        });
        if error.is_unauthorized() {
            self.expire_auth(&error.message);
        }
    }
}

/// Channel and poll callbacks for one connect/disconnect cycle.
struct SessionListener {
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
}

impl ChannelListener for SessionListener {
    fn on_event(&self, event: ServerEvent) {
        if !self.cancel.is_cancelled() {
            self.shared.apply_event(event);
        }
    }

    fn on_status(&self, status: ChannelStatus) {
        self.shared.update_if(|s| {
            let changed = s.connection != status;
            s.connection = status;
            changed
        });
    }

    fn on_unauthorized(&self, reason: &str) {
        if !self.cancel.is_cancelled() {
            self.shared.expire_auth(reason);
        }
    }
}

impl PollSink for SessionListener {
    fn on_snapshot(&self, items: Vec<Notification>) {
        if !self.cancel.is_cancelled() {
            self.shared.apply_snapshot(items);
        }
    }

    fn on_unauthorized(&self, error: &AppError) {
        if !self.cancel.is_cancelled() {
            self.shared.expire_auth(&error.message);
        }
    }
}

async fn sweep_alerts(shared: Arc<SessionShared>, every: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.update_if(|s| !s.alerts.expire(Utc::now()).is_empty());
            }
        }
    }
}

/// Notification sync client for one authenticated session.
pub struct NotificationSession {
    shared: Arc<SessionShared>,
    channel: ChannelManager,
    token: SessionToken,
    settings: SessionSettings,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the whole of `connect` so `disconnect` waits it out.
    connect_gate: AsyncMutex<()>,
}

impl std::fmt::Debug for NotificationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSession")
            .field("token", &self.token)
            .field("channel", &self.channel)
            .finish()
    }
}

impl NotificationSession {
    /// Create a disconnected session.
    pub fn new(
        source: Arc<dyn NotificationSource>,
        transport: Arc<dyn Transport>,
        token: SessionToken,
        settings: SessionSettings,
    ) -> AppResult<Self> {
        let channel = ChannelManager::new(
            transport,
            token.clone(),
            settings.channel.clone(),
            Arc::new(ChannelMetrics::new()),
        );
        for topic in &settings.topics {
            channel.subscribe(topic)?;
        }

        let state = SessionState {
            store: NotificationStore::new(),
            alerts: AlertQueue::new(settings.alerts.clone()),
            connection: ChannelStatus::default(),
            errors: Vec::new(),
            auth_expired: false,
            version: 0,
        };
        let (snapshots, _) = watch::channel(state.snapshot());

        Ok(Self {
            shared: Arc::new(SessionShared {
                source,
                state: Mutex::new(state),
                snapshots,
                lifecycle: Mutex::new(None),
            }),
            channel,
            token,
            settings,
            tasks: Mutex::new(Vec::new()),
            connect_gate: AsyncMutex::new(()),
        })
    }

    /// Create a disconnected session from configuration.
    pub fn from_config(
        config: &AppConfig,
        source: Arc<dyn NotificationSource>,
        transport: Arc<dyn Transport>,
        token: SessionToken,
    ) -> AppResult<Self> {
        Self::new(source, transport, token, SessionSettings::from_config(config))
    }

    /// Whether the channel, poller and sweeper are running.
    pub fn is_connected(&self) -> bool {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|c| !c.is_cancelled())
    }

    /// Load the list, open the channel and start polling.
    ///
    /// Refused while the token is missing or flagged expired. A failed
    /// initial load that is not an auth failure is logged and left to
    /// polling. Fails with a conflict when `disconnect` lands while the
    /// initial load is still in flight; nothing is applied in that case.
    pub async fn connect(&self) -> AppResult<()> {
        let _gate = self.connect_gate.lock().await;
        if self.shared.read(|s| s.auth_expired) {
            return Err(AppError::authentication(
                "Session token expired; reauthenticate before connecting",
            ));
        }
        if !self.token.is_present() {
            return Err(AppError::authentication("No session token"));
        }

        let cancel = {
            let mut lifecycle = self
                .shared
                .lifecycle
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if lifecycle.as_ref().is_some_and(|c| !c.is_cancelled()) {
                debug!("Session already connected");
                return Ok(());
            }
            let cancel = CancellationToken::new();
            *lifecycle = Some(cancel.clone());
            cancel
        };
        self.join_stale().await;

        let fetch = self
            .shared
            .source
            .fetch_all(self.settings.fetch.page_size, self.settings.fetch.max_pages);
        let initial = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = fetch => Some(result),
        };
        let Some(initial) = initial.filter(|_| !cancel.is_cancelled()) else {
            debug!("Disconnected during initial load");
            return Err(AppError::conflict("Session disconnected while connecting"));
        };
        match initial {
            Ok(items) => {
                info!(count = items.len(), "Initial notification load");
                self.shared.apply_snapshot(items);
            }
            Err(err) if err.is_unauthorized() => {
                self.shared.expire_auth(&err.message);
                return Err(err);
            }
            Err(err) => warn!(error = %err, "Initial load failed; polling will retry"),
        }
        if cancel.is_cancelled() {
            return Err(AppError::conflict("Session disconnected while connecting"));
        }

        let listener = Arc::new(SessionListener {
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
        });
        self.channel.connect(&cancel, listener.clone());

        let mut tasks = Vec::new();
        if let Some(interval) = self.settings.polling_interval {
            let poller = Poller::new(Arc::clone(&self.shared.source), interval, self.settings.fetch);
            tasks.push(tokio::spawn(poller.run(listener, cancel.clone())));
        }
        tasks.push(tokio::spawn(sweep_alerts(
            Arc::clone(&self.shared),
            self.settings.sweep_interval,
            cancel,
        )));
        *self.tasks.lock().unwrap_or_else(|e| e.into_inner()) = tasks;

        info!("Notification session connected");
        Ok(())
    }

    /// Close the channel with a normal closure code and stop every timer.
    /// Returns once nothing else will touch the store, including a
    /// `connect` that was still loading.
    pub async fn disconnect(&self) {
        let cancel = self
            .shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        let _gate = self.connect_gate.lock().await;
        self.join_stale().await;
        self.shared
            .update_if(|s| std::mem::take(&mut s.connection) != ChannelStatus::default());
        info!("Notification session disconnected");
    }

    async fn join_stale(&self) {
        self.channel.disconnect().await;
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
    }

    /// Swap in a fresh token, clear the expired flag and reconnect.
    pub async fn reauthenticate(&self, token: impl Into<String>) -> AppResult<()> {
        self.disconnect().await;
        self.token.set(token);
        self.shared.update(|s| s.auth_expired = false);
        info!("Session token replaced");
        self.connect().await
    }

    /// Reconnect now after the channel gave up, resetting the attempt
    /// counter.
    pub fn retry_connection(&self) -> AppResult<()> {
        if self.shared.read(|s| s.auth_expired) {
            return Err(AppError::authentication(
                "Session token expired; reauthenticate before retrying",
            ));
        }
        if !self.is_connected() {
            return Err(AppError::conflict("Session is not connected"));
        }
        self.channel.retry();
        Ok(())
    }

    /// Record a topic and subscribe on the open connection.
    pub fn subscribe(&self, topic: &str) -> AppResult<bool> {
        self.channel.subscribe(topic)
    }

    /// Forget a topic.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        self.channel.unsubscribe(topic)
    }

    /// Recorded topics.
    pub fn subscriptions(&self) -> Vec<String> {
        self.channel.subscriptions().list()
    }

    /// Mark one notification read, rolling back if the backend refuses.
    pub async fn mark_read(&self, id: impl Into<NotificationId>) -> AppResult<bool> {
        run_optimistic(&*self.shared, Mutation::MarkRead(id.into())).await
    }

    /// Mark every notification read, rolling back if the backend refuses.
    pub async fn mark_all_read(&self) -> AppResult<bool> {
        run_optimistic(&*self.shared, Mutation::MarkAllRead).await
    }

    /// Delete a notification, restoring it if the backend refuses.
    pub async fn remove(&self, id: impl Into<NotificationId>) -> AppResult<bool> {
        run_optimistic(&*self.shared, Mutation::Remove(id.into())).await
    }

    /// Fetch the full list now and replace local state with it.
    pub async fn refresh(&self) -> AppResult<()> {
        let result = self
            .shared
            .source
            .fetch_all(self.settings.fetch.page_size, self.settings.fetch.max_pages)
            .await;
        match result {
            Ok(items) => {
                self.shared.apply_snapshot(items);
                Ok(())
            }
            Err(err) => {
                if err.is_unauthorized() {
                    self.shared.expire_auth(&err.message);
                }
                Err(err)
            }
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Receiver notified after every change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Current unread count.
    pub fn unread_count(&self) -> usize {
        self.shared.read(|s| s.store.unread_count())
    }

    /// Current channel status.
    pub fn status(&self) -> ChannelStatus {
        self.shared.read(|s| s.connection)
    }

    /// Channel counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.channel.metrics()
    }

    /// Remove an alert.
    pub fn dismiss_alert(&self, id: AlertId) -> bool {
        self.shared.update_if(|s| s.alerts.dismiss(id))
    }

    /// Keep an alert on screen.
    pub fn pin_alert(&self, id: AlertId) -> bool {
        self.shared.update_if(|s| s.alerts.pin(id))
    }

    /// Release a pinned alert; its display timer restarts.
    pub fn unpin_alert(&self, id: AlertId) -> bool {
        self.shared.update_if(|s| s.alerts.unpin(id, Utc::now()))
    }

    /// Remove a surfaced error.
    pub fn dismiss_error(&self, id: ErrorId) -> bool {
        self.shared.update_if(|s| {
            let before = s.errors.len();
            s.errors.retain(|e| e.id != id);
            s.errors.len() != before
        })
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        if let Some(cancel) = self
            .shared
            .lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            cancel.cancel();
        }
    }
}
