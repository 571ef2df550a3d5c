//! Channel Manager: owns at most one duplex connection per session.
//!
//! `connect` spawns a worker task that drives the [`ChannelMachine`]:
//! it opens the transport, re-issues subscriptions, routes parsed events
//! to a [`ChannelListener`], keeps the connection alive with pings, and
//! reconnects with backoff. The worker stops on `disconnect`, on
//! cancellation of the parent token, or when the server rejects the
//! session token.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use notisync_core::config::AppConfig;
use notisync_core::result::AppResult;
use notisync_core::types::token::SessionToken;

use crate::channel::{
    ChannelAction, ChannelEvent, ChannelMachine, ChannelStatus, ReconnectPolicy, SubscriptionSet,
};
use crate::message::{ClientMessage, Inbound, ServerEvent, encode, parse_inbound};
use crate::metrics::ChannelMetrics;

use super::heartbeat::{Heartbeat, HeartbeatConfig};
use super::transport::{
    ChannelEndpoint, Connection, Frame, NORMAL_CLOSURE, Transport, TransportError,
};

/// Upper bound on waiting for a close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Receives what the channel produces.
///
/// Called from the worker task; implementations must not block.
pub trait ChannelListener: Send + Sync + 'static {
    /// A store-affecting event arrived.
    fn on_event(&self, event: ServerEvent);

    /// The connection status changed.
    fn on_status(&self, status: ChannelStatus);

    /// The server rejected the session token. The worker has stopped.
    fn on_unauthorized(&self, reason: &str);
}

/// Channel Manager tuning.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// Endpoint URL, without the token.
    pub url: String,
    /// Reconnect schedule.
    pub policy: ReconnectPolicy,
    /// Keepalive timing.
    pub heartbeat: HeartbeatConfig,
    /// Close code meaning "token expired".
    pub auth_close_code: u16,
}

impl ChannelSettings {
    /// Build from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            url: config.api.ws_url.clone(),
            policy: ReconnectPolicy::from_config(&config.realtime),
            heartbeat: HeartbeatConfig::from_config(&config.realtime),
            auth_close_code: config.realtime.auth_close_code,
        }
    }
}

#[derive(Debug)]
enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Retry,
}

#[derive(Debug)]
struct WorkerHandle {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<Command>,
    join: JoinHandle<()>,
}

/// Owned, per-session manager of the duplex channel.
#[derive(Debug)]
pub struct ChannelManager {
    transport: Arc<dyn Transport>,
    token: SessionToken,
    settings: ChannelSettings,
    subscriptions: Arc<SubscriptionSet>,
    metrics: Arc<ChannelMetrics>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl ChannelManager {
    /// Create a manager. Nothing is opened until [`connect`](Self::connect).
    pub fn new(
        transport: Arc<dyn Transport>,
        token: SessionToken,
        settings: ChannelSettings,
        metrics: Arc<ChannelMetrics>,
    ) -> Self {
        Self {
            transport,
            token,
            settings,
            subscriptions: Arc::new(SubscriptionSet::new()),
            metrics,
            worker: Mutex::new(None),
        }
    }

    /// Recorded subscriptions.
    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Channel counters.
    pub fn metrics(&self) -> crate::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether a worker is running.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|w| !w.join.is_finished() && !w.cancel.is_cancelled())
    }

    /// Start the worker under `parent`. Returns `false` if one is already
    /// running.
    pub fn connect(&self, parent: &CancellationToken, listener: Arc<dyn ChannelListener>) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = worker.as_ref() {
            if !existing.join.is_finished() && !existing.cancel.is_cancelled() {
                debug!("Channel worker already running");
                return false;
            }
        }
        if let Some(stale) = worker.take() {
            stale.cancel.cancel();
        }

        let cancel = parent.child_token();
        let (commands, rx) = mpsc::unbounded_channel();
        let task = ChannelWorker {
            transport: Arc::clone(&self.transport),
            token: self.token.clone(),
            settings: self.settings.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            metrics: Arc::clone(&self.metrics),
            listener,
            machine: ChannelMachine::new(self.settings.policy),
            commands: rx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(task.run());

        *worker = Some(WorkerHandle {
            cancel,
            commands,
            join,
        });
        true
    }

    /// Stop the worker, closing the transport with a normal closure code.
    /// Returns once the worker has exited.
    pub async fn disconnect(&self) {
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.join.await {
                warn!(error = %e, "Channel worker ended abnormally");
            }
        }
    }

    /// Record `topic` and subscribe on the open connection.
    /// Returns `false` if it was already recorded.
    pub fn subscribe(&self, topic: &str) -> AppResult<bool> {
        let added = self.subscriptions.add(topic)?;
        if added {
            self.send_command(Command::Subscribe(topic.to_string()));
        }
        Ok(added)
    }

    /// Forget `topic` and unsubscribe on the open connection.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.subscriptions.remove(topic);
        if removed {
            self.send_command(Command::Unsubscribe(topic.to_string()));
        }
        removed
    }

    /// Ask the worker to reconnect now, resetting the attempt counter.
    pub fn retry(&self) {
        self.send_command(Command::Retry);
    }

    fn send_command(&self, command: Command) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = worker.commands.send(command);
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            worker.cancel.cancel();
        }
    }
}

struct ChannelWorker {
    transport: Arc<dyn Transport>,
    token: SessionToken,
    settings: ChannelSettings,
    subscriptions: Arc<SubscriptionSet>,
    metrics: Arc<ChannelMetrics>,
    listener: Arc<dyn ChannelListener>,
    machine: ChannelMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl ChannelWorker {
    async fn run(mut self) {
        let mut action = self.transition(ChannelEvent::ConnectRequested);
        loop {
            action = match action {
                ChannelAction::OpenTransport => self.open().await,
                ChannelAction::ScheduleRetry(delay) => self.wait_retry(delay).await,
                ChannelAction::GiveUp => self.wait_manual_retry().await,
                ChannelAction::Stop => break,
                other => {
                    warn!(action = ?other, "Unexpected channel action, stopping");
                    break;
                }
            };
        }
        debug!("Channel worker stopped");
    }

    fn transition(&mut self, event: ChannelEvent) -> ChannelAction {
        let before = self.machine.status();
        let action = self.machine.handle(event);
        let after = self.machine.status();
        if before != after {
            self.listener.on_status(after);
        }
        action
    }

    async fn open(&mut self) -> ChannelAction {
        let endpoint = ChannelEndpoint::new(self.settings.url.clone(), self.token.get());
        let transport = Arc::clone(&self.transport);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = transport.connect(&endpoint) => Some(result),
        };

        match result {
            None => self.release(),
            Some(Ok(conn)) => {
                info!(url = %self.settings.url, "Channel open");
                self.metrics.connection_opened();
                match self.transition(ChannelEvent::TransportOpened) {
                    ChannelAction::Resubscribe => self.serve(conn).await,
                    other => other,
                }
            }
            Some(Err(TransportError::Unauthorized)) => self.unauthorized("handshake rejected"),
            Some(Err(e)) => {
                warn!(attempt = self.machine.attempt() + 1, error = %e, "Channel connect failed");
                self.transition(ChannelEvent::TransportFailed)
            }
        }
    }

    async fn serve(&mut self, mut conn: Box<dyn Connection>) -> ChannelAction {
        let mut subscribed = HashSet::new();
        for topic in self.subscriptions.list() {
            if let Err(e) = self.subscribe_on(&mut conn, &mut subscribed, topic).await {
                return self.lost(&e.to_string());
            }
        }

        let mut heartbeat = Heartbeat::new(self.settings.heartbeat);
        let mut ticker = heartbeat.ticker();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.close(&mut conn).await,
                frame = conn.recv() => match frame {
                    Some(Ok(Frame::Text(text))) => {
                        heartbeat.touch();
                        self.metrics.frame_received();
                        if let Err(e) = self.handle_text(&mut conn, &text).await {
                            return self.lost(&e.to_string());
                        }
                    }
                    Some(Ok(Frame::Heartbeat)) => heartbeat.touch(),
                    Some(Ok(Frame::Closed { code: Some(code), reason }))
                        if code == self.settings.auth_close_code =>
                    {
                        return self.unauthorized(&reason);
                    }
                    Some(Ok(Frame::Closed { code, reason })) => {
                        warn!(code = ?code, reason = %reason, "Channel closed by server");
                        return self.lost("closed by server");
                    }
                    Some(Err(TransportError::Unauthorized)) => {
                        return self.unauthorized("rejected by server");
                    }
                    Some(Err(e)) => return self.lost(&e.to_string()),
                    None => return self.lost("connection ended"),
                },
                Some(command) = self.commands.recv() => {
                    let result = match command {
                        Command::Subscribe(topic) => {
                            self.subscribe_on(&mut conn, &mut subscribed, topic).await
                        }
                        Command::Unsubscribe(topic) => {
                            if subscribed.remove(&topic) {
                                self.send_message(&mut conn, &ClientMessage::Unsubscribe { channel: topic })
                                    .await
                            } else {
                                Ok(())
                            }
                        }
                        Command::Retry => Ok(()),
                    };
                    if let Err(e) = result {
                        return self.lost(&e.to_string());
                    }
                }
                _ = ticker.tick() => {
                    if heartbeat.is_expired() {
                        return self.lost("heartbeat timeout");
                    }
                    if let Err(e) = conn.ping().await {
                        return self.lost(&e.to_string());
                    }
                    self.metrics.ping_sent();
                }
            }
        }
    }

    /// Subscribe to `topic` on this connection unless already done.
    async fn subscribe_on(
        &self,
        conn: &mut Box<dyn Connection>,
        subscribed: &mut HashSet<String>,
        topic: String,
    ) -> Result<(), TransportError> {
        if !self.subscriptions.contains(&topic) || subscribed.contains(&topic) {
            return Ok(());
        }
        self.send_message(conn, &ClientMessage::Subscribe { channel: topic.clone() })
            .await?;
        debug!(topic = %topic, "Subscribed");
        subscribed.insert(topic);
        Ok(())
    }

    async fn handle_text(
        &self,
        conn: &mut Box<dyn Connection>,
        text: &str,
    ) -> Result<(), TransportError> {
        match parse_inbound(text) {
            Ok(Inbound::Event(event)) => {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                debug!(
                    kind = event.kind(),
                    notification_id = %event.notification_id(),
                    "Applying channel event"
                );
                self.metrics.event_applied();
                self.listener.on_event(event);
            }
            Ok(Inbound::Ping { timestamp }) => {
                self.send_message(conn, &ClientMessage::Pong { timestamp })
                    .await?;
            }
            Ok(Inbound::Ignored(kind)) => {
                debug!(kind = %kind, "Ignoring unknown channel event");
                self.metrics.event_ignored();
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed channel payload");
                self.metrics.malformed();
            }
        }
        Ok(())
    }

    async fn send_message(
        &self,
        conn: &mut Box<dyn Connection>,
        message: &ClientMessage,
    ) -> Result<(), TransportError> {
        let text = encode(message).map_err(|e| TransportError::Protocol(e.to_string()))?;
        conn.send(text).await?;
        self.metrics.message_sent();
        Ok(())
    }

    fn lost(&mut self, reason: &str) -> ChannelAction {
        warn!(reason = %reason, "Channel connection lost");
        self.transition(ChannelEvent::TransportClosed)
    }

    fn unauthorized(&mut self, reason: &str) -> ChannelAction {
        warn!(reason = %reason, "Channel rejected the session token");
        if !self.cancel.is_cancelled() {
            self.listener.on_unauthorized(reason);
        }
        self.transition(ChannelEvent::AuthRejected)
    }

    async fn close(&mut self, conn: &mut Box<dyn Connection>) -> ChannelAction {
        if self.transition(ChannelEvent::DisconnectRequested) == ChannelAction::CloseTransport {
            match time::timeout(CLOSE_TIMEOUT, conn.close(NORMAL_CLOSURE, "session ended")).await {
                Ok(Ok(())) => debug!("Channel closed"),
                Ok(Err(e)) => debug!(error = %e, "Channel close failed"),
                Err(_) => debug!("Channel close timed out"),
            }
        }
        self.transition(ChannelEvent::TransportReleased)
    }

    /// Finish a cancellation that arrived while no transport was open.
    fn release(&mut self) -> ChannelAction {
        match self.transition(ChannelEvent::DisconnectRequested) {
            ChannelAction::CloseTransport => self.transition(ChannelEvent::TransportReleased),
            other => other,
        }
    }

    async fn wait_retry(&mut self, delay: Duration) -> ChannelAction {
        self.metrics.reconnect_scheduled();
        info!(
            attempt = self.machine.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.release(),
                _ = &mut sleep => return self.transition(ChannelEvent::RetryElapsed),
                Some(command) = self.commands.recv() => {
                    if matches!(command, Command::Retry) {
                        return self.transition(ChannelEvent::ManualRetry);
                    }
                }
            }
        }
    }

    async fn wait_manual_retry(&mut self) -> ChannelAction {
        error!(
            attempts = self.machine.attempt(),
            "Channel gave up reconnecting; waiting for a manual retry"
        );
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.release(),
                Some(command) = self.commands.recv() => {
                    if matches!(command, Command::Retry) {
                        info!("Manual channel retry");
                        return self.transition(ChannelEvent::ManualRetry);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::MemoryTransport;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ServerEvent>>,
        statuses: Mutex<Vec<ChannelStatus>>,
        unauthorized: Mutex<Vec<String>>,
    }

    impl ChannelListener for Recorder {
        fn on_event(&self, event: ServerEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_status(&self, status: ChannelStatus) {
            self.statuses.lock().unwrap().push(status);
        }

        fn on_unauthorized(&self, reason: &str) {
            self.unauthorized.lock().unwrap().push(reason.to_string());
        }
    }

    impl Recorder {
        fn last_state(&self) -> Option<crate::channel::ConnectionState> {
            self.statuses.lock().unwrap().last().map(|s| s.state)
        }
    }

    fn settings() -> ChannelSettings {
        ChannelSettings {
            url: "memory://test".to_string(),
            policy: ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(40), 3),
            heartbeat: HeartbeatConfig {
                ping_interval: Duration::from_millis(50),
                ping_timeout: Duration::from_millis(50),
            },
            auth_close_code: 4401,
        }
    }

    fn manager(transport: &MemoryTransport) -> ChannelManager {
        ChannelManager::new(
            Arc::new(transport.clone()),
            SessionToken::new("tok"),
            settings(),
            Arc::new(ChannelMetrics::new()),
        )
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_connects_and_routes_events() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport);
        manager.subscribe("notifications").unwrap();
        let recorder = Arc::new(Recorder::default());

        assert!(manager.connect(&CancellationToken::new(), recorder.clone()));
        eventually(|| transport.sent(0).len() == 1).await;
        assert_eq!(
            transport.sent(0),
            vec![r#"{"type":"subscribe","channel":"notifications"}"#]
        );

        transport.push(r#"{"type":"deleted","id":"n1"}"#);
        transport.push("garbage");
        transport.push(r#"{"type":"read","id":"n2"}"#);
        eventually(|| recorder.events.lock().unwrap().len() == 2).await;
        assert_eq!(manager.metrics.snapshot().malformed_dropped, 1);

        manager.disconnect().await;
        assert_eq!(transport.close_code(0), Some(NORMAL_CLOSURE));
        assert_eq!(
            recorder.last_state(),
            Some(crate::channel::ConnectionState::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_answers_application_ping() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport);
        manager.connect(&CancellationToken::new(), Arc::new(Recorder::default()));
        eventually(|| transport.connection_count() == 1).await;

        transport.push(r#"{"type":"ping","timestamp":99}"#);
        eventually(|| transport.sent(0).iter().any(|m| m.contains("pong"))).await;
        assert_eq!(transport.sent(0), vec![r#"{"type":"pong","timestamp":99}"#]);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_subscribe_while_open_is_sent_once() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport);
        manager.connect(&CancellationToken::new(), Arc::new(Recorder::default()));
        eventually(|| transport.connection_count() == 1).await;

        assert!(manager.subscribe("user:7").unwrap());
        assert!(!manager.subscribe("user:7").unwrap());
        eventually(|| !transport.sent(0).is_empty()).await;
        assert!(manager.unsubscribe("user:7"));
        eventually(|| transport.sent(0).len() == 2).await;
        assert!(transport.sent(0)[1].contains("unsubscribe"));
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_auth_close_code_stops_worker() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport);
        let recorder = Arc::new(Recorder::default());
        manager.connect(&CancellationToken::new(), recorder.clone());
        eventually(|| transport.connection_count() == 1).await;

        transport.close_connection(4401, "token expired");
        eventually(|| !recorder.unauthorized.lock().unwrap().is_empty()).await;
        eventually(|| !manager.is_running()).await;

        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_handshake_rejection_is_unauthorized() {
        let transport = MemoryTransport::new();
        transport.set_reject_token(true);
        let manager = manager(&transport);
        let recorder = Arc::new(Recorder::default());
        manager.connect(&CancellationToken::new(), recorder.clone());

        eventually(|| !recorder.unauthorized.lock().unwrap().is_empty()).await;
        assert_eq!(transport.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_then_manual_retry() {
        let transport = MemoryTransport::new();
        transport.set_refuse(true);
        let manager = manager(&transport);
        let recorder = Arc::new(Recorder::default());
        manager.connect(&CancellationToken::new(), recorder.clone());

        // One initial attempt plus three retries, then nothing more.
        eventually(|| recorder.statuses.lock().unwrap().iter().any(|s| s.exhausted)).await;
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.connect_attempts(), 4);

        transport.set_refuse(false);
        manager.retry();
        eventually(|| transport.connection_count() == 1).await;
        eventually(|| recorder.last_state() == Some(crate::channel::ConnectionState::Open)).await;
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_silent_peer_triggers_reconnect() {
        let transport = MemoryTransport::new();
        transport.set_silent(true);
        let manager = manager(&transport);
        manager.connect(&CancellationToken::new(), Arc::new(Recorder::default()));

        eventually(|| transport.connection_count() >= 2).await;
        assert!(transport.pings(0) >= 1);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_worker() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport);
        let parent = CancellationToken::new();
        manager.connect(&parent, Arc::new(Recorder::default()));
        eventually(|| transport.connection_count() == 1).await;

        parent.cancel();
        eventually(|| !manager.is_running()).await;
        eventually(|| transport.close_code(0) == Some(NORMAL_CLOSURE)).await;
    }
}
