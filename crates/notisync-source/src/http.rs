//! REST backend source.
//!
//! Talks to:
//! - `GET    {base}/notifications?page=&page_size=`
//! - `POST   {base}/notifications/{id}/read`
//! - `POST   {base}/notifications/read-all`
//! - `DELETE {base}/notifications/{id}`
//!
//! Every request carries the session's bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use notisync_core::config::ApiConfig;
use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;
use notisync_core::types::id::NotificationId;
use notisync_core::types::pagination::{PageRequest, PageResponse};
use notisync_core::types::token::SessionToken;
use notisync_entity::Notification;

use crate::provider::NotificationSource;

/// Error body the backend returns on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// [`NotificationSource`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct HttpNotificationSource {
    client: reqwest::Client,
    base_url: Url,
    token: SessionToken,
}

impl HttpNotificationSource {
    /// Create a source for the backend described by `config`.
    pub fn new(config: &ApiConfig, token: SessionToken) -> AppResult<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            AppError::configuration(format!("Invalid api.base_url '{}': {e}", config.base_url))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Failed to build HTTP client: {e}"),
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::internal(format!("Invalid request path '{path}': {e}")))
    }

    /// `notifications/{id}[/{action}]`, with `id` escaped as one segment.
    fn item_url(&self, id: &NotificationId, action: Option<&str>) -> AppResult<Url> {
        let mut url = self.url("notifications")?;
        url.path_segments_mut()
            .map_err(|_| AppError::configuration("api.base_url cannot be a base URL"))?
            .pop_if_empty()
            .push(id.as_str())
            .extend(action);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url) -> AppResult<reqwest::Response> {
        let mut request = self.client.request(method.clone(), url.clone());
        if self.token.is_present() {
            request = request.bearer_auth(self.token.get());
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Transport,
                format!("{method} {} failed: {e}", url.path()),
                e,
            )
        })?;

        let status = response.status();
        debug!(method = %method, path = %url.path(), status = %status, "Backend responded");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = error_for_status(status, &body);
        warn!(method = %method, path = %url.path(), status = %status, error = %err, "Backend request failed");
        Err(err)
    }
}

/// Map a failure status and body into an [`AppError`].
fn error_for_status(status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| body.chars().take(200).collect());
    let message = if detail.is_empty() {
        format!("Backend returned {status}")
    } else {
        format!("Backend returned {status}: {detail}")
    };

    let kind = match status {
        StatusCode::UNAUTHORIZED => ErrorKind::Authentication,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
        _ => ErrorKind::ExternalService,
    };
    AppError::new(kind, message)
}

#[async_trait]
impl NotificationSource for HttpNotificationSource {
    async fn fetch_page(&self, page: &PageRequest) -> AppResult<PageResponse<Notification>> {
        let mut url = self.url("notifications")?;
        url.query_pairs_mut()
            .extend_pairs(page.query_pairs().iter().map(|(k, v)| (*k, v.as_str())));

        let response = self.send(Method::GET, url).await?;
        response.json::<PageResponse<Notification>>().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Malformed notification page: {e}"),
                e,
            )
        })
    }

    async fn mark_read(&self, id: &NotificationId) -> AppResult<()> {
        let url = self.item_url(id, Some("read"))?;
        self.send(Method::POST, url).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> AppResult<()> {
        let url = self.url("notifications/read-all")?;
        self.send(Method::POST, url).await?;
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> AppResult<()> {
        let url = self.item_url(id, None)?;
        self.send(Method::DELETE, url).await?;
        Ok(())
    }
}
