//! WebSocket transport over tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::transport::{ChannelEndpoint, Connection, Frame, Transport, TransportError};

/// Opens WebSocket connections, passing the bearer token as the `token`
/// query parameter.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// Create a transport that abandons handshakes after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &self,
        endpoint: &ChannelEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let url = endpoint.authorized_url()?;
        debug!(url = %endpoint.url, "Opening WebSocket");

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        match tokio::time::timeout(self.connect_timeout, handshake).await {
            Err(_) => Err(TransportError::Connect(format!(
                "handshake timed out after {:?}",
                self.connect_timeout
            ))),
            Ok(Ok((stream, _response))) => Ok(Box::new(WebSocketConnection { stream })),
            Ok(Err(WsError::Http(response))) if response.status().as_u16() == 401 => {
                Err(TransportError::Unauthorized)
            }
            Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
        }
    }
}

/// An open WebSocket.
#[derive(Debug)]
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };

            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_string()),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Frame::Text(text),
                    Err(_) => {
                        debug!(len = bytes.len(), "Skipping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Message::Ping(_) | Message::Pong(_) => Frame::Heartbeat,
                Message::Close(close) => Frame::Closed {
                    code: close.as_ref().map(|c| u16::from(c.code)),
                    reason: close
                        .map(|c| c.reason.as_str().to_string())
                        .unwrap_or_default(),
                },
                Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
