//! Data source trait and the manager that selects an implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use notisync_core::config::AppConfig;
use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_core::types::id::NotificationId;
use notisync_core::types::pagination::{PageRequest, PageResponse};
use notisync_core::types::token::SessionToken;
use notisync_entity::Notification;

/// Backend collaborator for the notification list.
///
/// Implementations perform I/O only; they never touch client state.
/// Errors are classified through [`AppError::kind`]: `Transport` for
/// network failures, `Authentication` for a rejected token, anything
/// else for a server-reported failure.
#[async_trait]
pub trait NotificationSource: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch one page of notifications.
    async fn fetch_page(&self, page: &PageRequest) -> AppResult<PageResponse<Notification>>;

    /// Mark one notification read on the server.
    async fn mark_read(&self, id: &NotificationId) -> AppResult<()>;

    /// Mark every notification read on the server.
    async fn mark_all_read(&self) -> AppResult<()>;

    /// Delete one notification on the server.
    async fn delete(&self, id: &NotificationId) -> AppResult<()>;

    /// Fetch the complete list by walking pages until the server reports
    /// no further page or `max_pages` pages have been read.
    async fn fetch_all(&self, page_size: u64, max_pages: u64) -> AppResult<Vec<Notification>> {
        let mut request = PageRequest::new(1, page_size);
        let mut all = Vec::new();

        for _ in 0..max_pages.max(1) {
            let page = self.fetch_page(&request).await?;
            let received = page.items.len();
            all.extend(page.items);

            if !page.has_next || received == 0 {
                return Ok(all);
            }
            request = request.next();
        }

        debug!(
            max_pages,
            fetched = all.len(),
            "Stopped full fetch at page limit"
        );
        Ok(all)
    }
}

/// Builds the configured [`NotificationSource`].
#[derive(Debug, Clone)]
pub struct SourceManager {
    /// The inner source.
    inner: Arc<dyn NotificationSource>,
}

impl SourceManager {
    /// Create a source from configuration.
    pub fn new(config: &AppConfig, token: SessionToken) -> AppResult<Self> {
        let inner: Arc<dyn NotificationSource> = match config.source.provider.as_str() {
            "http" => {
                info!(base_url = %config.api.base_url, "Initializing HTTP notification source");
                Arc::new(crate::http::HttpNotificationSource::new(&config.api, token)?)
            }
            "fixture" => {
                info!("Initializing fixture notification source");
                let source = match &config.source.fixture_path {
                    Some(path) => crate::fixture::FixtureNotificationSource::from_file(path)?,
                    None => crate::fixture::FixtureNotificationSource::default(),
                };
                Arc::new(source)
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown notification source: '{other}'. Supported: http, fixture"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Shared handle to the selected source.
    pub fn source(&self) -> Arc<dyn NotificationSource> {
        Arc::clone(&self.inner)
    }
}
