//! In-process transport.
//!
//! Each `connect` creates a connection whose server side is driven
//! through the [`MemoryTransport`] handle: push frames, drop or close the
//! connection, refuse or reject handshakes, and inspect what the client
//! sent. Clones share the same peer state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::transport::{ChannelEndpoint, Connection, Frame, Transport, TransportError};

#[derive(Debug, Default)]
struct Peer {
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    sent: Vec<String>,
    pings: u32,
    closed_with: Option<u16>,
    token: String,
}

#[derive(Debug, Default)]
struct PeerState {
    fail_next: u32,
    refuse: bool,
    reject_token: bool,
    silent: bool,
    attempts: u32,
    peers: Vec<Peer>,
}

/// In-memory [`Transport`] with a scriptable server side.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<PeerState>>,
}

impl MemoryTransport {
    /// Create a transport that accepts every connection.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PeerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Fail the next `n` connection attempts.
    pub fn fail_next(&self, n: u32) {
        self.with_state(|s| s.fail_next = n);
    }

    /// Refuse every connection attempt until called with `false`.
    pub fn set_refuse(&self, refuse: bool) {
        self.with_state(|s| s.refuse = refuse);
    }

    /// Reject handshakes as unauthorized until called with `false`.
    pub fn set_reject_token(&self, reject: bool) {
        self.with_state(|s| s.reject_token = reject);
    }

    /// Stop answering keepalive pings.
    pub fn set_silent(&self, silent: bool) {
        self.with_state(|s| s.silent = silent);
    }

    /// Connection attempts seen so far, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.with_state(|s| s.attempts)
    }

    /// Connections successfully opened so far.
    pub fn connection_count(&self) -> usize {
        self.with_state(|s| s.peers.len())
    }

    /// Deliver a text frame on the newest connection.
    pub fn push(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.with_state(|s| match s.peers.last() {
            Some(peer) => send_frame(peer, Frame::Text(text)),
            None => false,
        })
    }

    /// Deliver a text frame on connection `index`, open or not.
    pub fn push_to(&self, index: usize, text: impl Into<String>) -> bool {
        let text = text.into();
        self.with_state(|s| match s.peers.get(index) {
            Some(peer) => send_frame(peer, Frame::Text(text)),
            None => false,
        })
    }

    /// Abruptly end the newest connection without a close frame.
    pub fn drop_connection(&self) -> bool {
        self.with_state(|s| match s.peers.last_mut() {
            Some(peer) => peer.to_client.take().is_some(),
            None => false,
        })
    }

    /// Send a close frame with `code` on the newest connection, then end it.
    pub fn close_connection(&self, code: u16, reason: &str) -> bool {
        self.with_state(|s| match s.peers.last_mut() {
            Some(peer) => {
                let delivered = send_frame(
                    peer,
                    Frame::Closed {
                        code: Some(code),
                        reason: reason.to_string(),
                    },
                );
                peer.to_client = None;
                delivered
            }
            None => false,
        })
    }

    /// Text payloads the client sent on connection `index`.
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.with_state(|s| s.peers.get(index).map(|p| p.sent.clone()).unwrap_or_default())
    }

    /// Keepalive pings received on connection `index`.
    pub fn pings(&self, index: usize) -> u32 {
        self.with_state(|s| s.peers.get(index).map(|p| p.pings).unwrap_or(0))
    }

    /// Close code the client used on connection `index`, if it closed it.
    pub fn close_code(&self, index: usize) -> Option<u16> {
        self.with_state(|s| s.peers.get(index).and_then(|p| p.closed_with))
    }

    /// Token presented when connection `index` was opened.
    pub fn token(&self, index: usize) -> Option<String> {
        self.with_state(|s| s.peers.get(index).map(|p| p.token.clone()))
    }
}

fn send_frame(peer: &Peer, frame: Frame) -> bool {
    peer.to_client
        .as_ref()
        .map(|tx| tx.send(frame).is_ok())
        .unwrap_or(false)
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        endpoint: &ChannelEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let state = Arc::clone(&self.state);
        self.with_state(|s| {
            s.attempts += 1;
            if s.reject_token {
                return Err(TransportError::Unauthorized);
            }
            if s.refuse {
                return Err(TransportError::Connect("connection refused".to_string()));
            }
            if s.fail_next > 0 {
                s.fail_next -= 1;
                return Err(TransportError::Connect("connection reset".to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            s.peers.push(Peer {
                to_client: Some(tx),
                token: endpoint.token.clone(),
                ..Default::default()
            });
            let index = s.peers.len() - 1;
            debug!(index, "Memory connection opened");

            Ok(Box::new(MemoryConnection { index, rx, state }) as Box<dyn Connection>)
        })
    }
}

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    index: usize,
    rx: mpsc::UnboundedReceiver<Frame>,
    state: Arc<Mutex<PeerState>>,
}

impl MemoryConnection {
    fn with_peer<R>(&self, f: impl FnOnce(&mut Peer, bool) -> R) -> Option<R> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let silent = state.silent;
        state.peers.get_mut(self.index).map(|peer| f(peer, silent))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.with_peer(|peer, _| {
            if peer.to_client.is_none() {
                return Err(TransportError::Send("connection closed".to_string()));
            }
            peer.sent.push(text);
            Ok(())
        })
        .unwrap_or_else(|| Err(TransportError::Send("unknown connection".to_string())))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.with_peer(|peer, silent| {
            if peer.to_client.is_none() {
                return Err(TransportError::Send("connection closed".to_string()));
            }
            peer.pings += 1;
            if !silent {
                send_frame(peer, Frame::Heartbeat);
            }
            Ok(())
        })
        .unwrap_or_else(|| Err(TransportError::Send("unknown connection".to_string())))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<(), TransportError> {
        self.with_peer(|peer, _| {
            peer.closed_with = Some(code);
            peer.to_client = None;
        });
        Ok(())
    }
}
