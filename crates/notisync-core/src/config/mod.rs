//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional `config/default.toml`, an explicit file, and environment
//! variables prefixed with `NOTISYNC`. Each sub-module represents a
//! logical configuration section.

pub mod alerts;
pub mod api;
pub mod logging;
pub mod polling;
pub mod realtime;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::alerts::AlertConfig;
pub use self::api::{ApiConfig, AuthConfig, SourceConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::polling::PollingConfig;
pub use self::realtime::RealtimeConfig;

use crate::error::AppError;

/// Root client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoints.
    #[serde(default)]
    pub api: ApiConfig,
    /// Session credentials.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Data source selection.
    #[serde(default)]
    pub source: SourceConfig,
    /// Duplex channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Polling fallback settings.
    #[serde(default)]
    pub polling: PollingConfig,
    /// On-screen alert settings.
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default.toml` (if present), the file at `path` (if
    /// given), and environment variables prefixed with `NOTISYNC__`, e.g.
    /// `NOTISYNC__AUTH__TOKEN`. The result is validated before returning.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Some(path) = path {
            tracing::debug!(path = %path, "Loading configuration file");
            builder = builder.add_source(config::File::from(Path::new(path)).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("NOTISYNC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("realtime.topics"),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the sync client cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        let realtime = &self.realtime;
        if realtime.reconnect_base_delay_ms == 0 {
            return Err(AppError::configuration(
                "realtime.reconnect_base_delay_ms must be greater than zero",
            ));
        }
        if realtime.reconnect_base_delay_ms > realtime.reconnect_max_delay_ms {
            return Err(AppError::configuration(format!(
                "realtime.reconnect_base_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                realtime.reconnect_base_delay_ms, realtime.reconnect_max_delay_ms
            )));
        }
        if realtime.reconnect_max_attempts == 0 {
            return Err(AppError::configuration(
                "realtime.reconnect_max_attempts must be at least 1",
            ));
        }
        if realtime.ping_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.ping_interval_seconds must be greater than zero",
            ));
        }
        if self.polling.enabled && self.polling.interval_seconds == 0 {
            return Err(AppError::configuration(
                "polling.interval_seconds must be greater than zero",
            ));
        }
        if self.api.page_size == 0 || self.api.max_pages == 0 {
            return Err(AppError::configuration(
                "api.page_size and api.max_pages must be greater than zero",
            ));
        }
        if self.alerts.sweep_interval_ms == 0 {
            return Err(AppError::configuration(
                "alerts.sweep_interval_ms must be greater than zero",
            ));
        }
        if self.source.provider == "http" && self.api.base_url.trim().is_empty() {
            return Err(AppError::configuration(
                "api.base_url is required for the http source",
            ));
        }
        if self.realtime.transport == "websocket" && self.api.ws_url.trim().is_empty() {
            return Err(AppError::configuration(
                "api.ws_url is required for the websocket transport",
            ));
        }
        if self.realtime.transport == "websocket" {
            url::Url::parse(&self.api.ws_url).map_err(|e| {
                AppError::configuration(format!("api.ws_url '{}' is invalid: {e}", self.api.ws_url))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.realtime.reconnect_base_delay_ms, 1_000);
        assert_eq!(config.realtime.reconnect_max_attempts, 10);
        assert_eq!(config.polling.interval_seconds, 120);
        assert_eq!(config.alerts.recency_window_seconds, 300);
        assert_eq!(config.realtime.topics, vec!["notifications".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://api.example.test"

[realtime]
reconnect_base_delay_ms = 250
reconnect_max_delay_ms = 4000
topics = ["notifications", "appointments"]

[polling]
interval_seconds = 60
"#,
        )
        .expect("write");

        let config = AppConfig::load(path.to_str()).expect("load");
        assert_eq!(config.api.base_url, "https://api.example.test");
        assert_eq!(config.realtime.reconnect_base_delay_ms, 250);
        assert_eq!(config.realtime.reconnect_max_delay_ms, 4000);
        assert_eq!(config.realtime.topics.len(), 2);
        assert_eq!(config.polling.interval_seconds, 60);
        // untouched sections keep their defaults
        assert_eq!(config.alerts.max_visible, 5);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = AppConfig::load(Some("/nonexistent/notisync.toml")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = AppConfig::default();
        config.realtime.reconnect_base_delay_ms = 60_000;
        config.realtime.reconnect_max_delay_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.realtime.reconnect_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_ws_url() {
        let mut config = AppConfig::default();
        config.api.ws_url = "/ws".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        config.realtime.transport = "memory".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_allowed_when_disabled() {
        let mut config = AppConfig::default();
        config.polling.interval_seconds = 0;
        assert!(config.validate().is_err());
        config.polling.enabled = false;
        assert!(config.validate().is_ok());
    }
}
