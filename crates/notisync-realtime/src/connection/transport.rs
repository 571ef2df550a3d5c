//! Transport abstraction for the duplex channel.
//!
//! A [`Transport`] opens [`Connection`]s. The Channel Manager only ever
//! talks to these traits, so the reconnect and reconciliation logic runs
//! the same over a real WebSocket and over the in-memory peer.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use notisync_core::config::RealtimeConfig;
use notisync_core::error::AppError;
use notisync_core::result::AppResult;

use super::memory::MemoryTransport;
use super::websocket::WebSocketTransport;

/// Close code sent on a normal, client-initiated closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Failures raised by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The handshake was rejected because the token is not valid.
    #[error("server rejected the session token")]
    Unauthorized,
    /// Writing to the connection failed.
    #[error("send failed: {0}")]
    Send(String),
    /// The connection broke while reading.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized => AppError::authentication(err.to_string()),
            other => AppError::with_source(
                notisync_core::error::ErrorKind::Transport,
                other.to_string(),
                other,
            ),
        }
    }
}

/// One item read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text payload.
    Text(String),
    /// A transport-level keepalive (ping or pong) from the peer.
    Heartbeat,
    /// The peer sent a close frame.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
}

/// Where and as whom to connect.
#[derive(Clone)]
pub struct ChannelEndpoint {
    /// Base endpoint URL.
    pub url: String,
    /// Bearer token, passed as the `token` connection parameter.
    pub token: String,
}

impl std::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("url", &self.url)
            .finish()
    }
}

impl ChannelEndpoint {
    /// Create an endpoint.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// The URL with the bearer token appended as a query parameter.
    pub fn authorized_url(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| TransportError::Connect(format!("invalid endpoint url: {e}")))?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

/// An open duplex connection.
#[async_trait]
pub trait Connection: Send + std::fmt::Debug {
    /// Send a text payload.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a transport-level ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Read the next frame; `None` once the connection is gone.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Close the connection with the given code and reason.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// Opens connections to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Open a connection to `endpoint`.
    async fn connect(
        &self,
        endpoint: &ChannelEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// Build the transport selected by `realtime.transport`.
pub fn build_transport(config: &RealtimeConfig) -> AppResult<Arc<dyn Transport>> {
    match config.transport.as_str() {
        "websocket" => Ok(Arc::new(WebSocketTransport::new(config.ping_timeout()))),
        "memory" => Ok(Arc::new(MemoryTransport::new())),
        other => Err(AppError::configuration(format!(
            "Unknown realtime transport: '{other}'. Supported: websocket, memory"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorized_url_appends_token() {
        let endpoint = ChannelEndpoint::new("wss://api.example.com/ws", "abc.def+g/h=");
        assert_eq!(
            endpoint.authorized_url().unwrap().as_str(),
            "wss://api.example.com/ws?token=abc.def%2Bg%2Fh%3D"
        );

        let with_query = ChannelEndpoint::new("ws://localhost/ws?v=2", "t");
        assert_eq!(
            with_query.authorized_url().unwrap().as_str(),
            "ws://localhost/ws?v=2&token=t"
        );
    }

    #[test]
    fn test_authorized_url_rejects_malformed_endpoint() {
        let endpoint = ChannelEndpoint::new("not a url", "t");
        let err = endpoint.authorized_url().unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }

    #[test]
    fn test_endpoint_debug_hides_token() {
        let endpoint = ChannelEndpoint::new("ws://x", "secret");
        assert!(!format!("{endpoint:?}").contains("secret"));
    }

    #[test]
    fn test_unauthorized_maps_to_authentication() {
        let err: AppError = TransportError::Unauthorized.into();
        assert!(err.is_unauthorized());
        let err: AppError = TransportError::Connect("refused".into()).into();
        assert!(err.is_transport());
    }

    #[test]
    fn test_build_transport_rejects_unknown() {
        let mut config = RealtimeConfig::default();
        config.transport = "carrier-pigeon".to_string();
        assert!(build_transport(&config).is_err());
        config.transport = "memory".to_string();
        assert!(build_transport(&config).is_ok());
    }
}
