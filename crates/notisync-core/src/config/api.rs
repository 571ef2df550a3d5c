//! Backend API, credentials, and data source configuration.

use serde::{Deserialize, Serialize};

/// REST and WebSocket endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST backend (without trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// URL of the duplex notification channel.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Page size requested from `GET /notifications`.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Upper bound on pages walked by a full fetch.
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            request_timeout_seconds: default_request_timeout(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

/// Session credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token issued by the login flow. Usually supplied via
    /// `NOTISYNC__AUTH__TOKEN` rather than a file.
    #[serde(default)]
    pub token: String,
}

/// Data source selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provider name: `"http"` or `"fixture"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// JSON file holding fixture notifications (fixture provider only).
    #[serde(default)]
    pub fixture_path: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            fixture_path: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_page_size() -> u64 {
    50
}

fn default_max_pages() -> u64 {
    20
}

fn default_provider() -> String {
    "http".to_string()
}
