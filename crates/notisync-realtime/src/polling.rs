//! Polling fallback.
//!
//! Independent of the channel, fetch the full list on a fixed interval
//! and hand it to the store for wholesale replacement. This is the only
//! repair path for events missed while the channel was down.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_entity::Notification;
use notisync_source::NotificationSource;

/// Receives poll results.
pub trait PollSink: Send + Sync + 'static {
    /// A full, authoritative list was fetched.
    fn on_snapshot(&self, items: Vec<Notification>);

    /// The backend rejected the session token. Polling has stopped.
    fn on_unauthorized(&self, error: &AppError);
}

/// Fetch settings shared by polling, the initial load, and `refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Items per page.
    pub page_size: u64,
    /// Upper bound on pages per full fetch.
    pub max_pages: u64,
}

impl FetchSettings {
    /// Build from the `[api]` section.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.api.page_size,
            max_pages: config.api.max_pages,
        }
    }
}

/// Periodic full-list fetcher.
#[derive(Debug, Clone)]
pub struct Poller {
    source: Arc<dyn NotificationSource>,
    interval: Duration,
    fetch: FetchSettings,
}

impl Poller {
    /// Create a poller.
    pub fn new(source: Arc<dyn NotificationSource>, interval: Duration, fetch: FetchSettings) -> Self {
        Self {
            source,
            interval,
            fetch,
        }
    }

    /// Fetch the full list once.
    pub async fn poll_once(&self) -> AppResult<Vec<Notification>> {
        self.source
            .fetch_all(self.fetch.page_size, self.fetch.max_pages)
            .await
    }

    /// Poll until `cancel` fires or the token is rejected. The first poll
    /// happens one interval from now.
    pub async fn run(self, sink: Arc<dyn PollSink>, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs_f64(), "Polling started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(items) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!(count = items.len(), "Poll fetched notifications");
                    sink.on_snapshot(items);
                }
                Err(err) if err.is_unauthorized() => {
                    warn!(error = %err, "Poll rejected, stopping");
                    if !cancel.is_cancelled() {
                        sink.on_unauthorized(&err);
                    }
                    break;
                }
                Err(err) => warn!(error = %err, "Poll failed, will retry next interval"),
            }
        }

        debug!("Polling stopped");
    }
}
