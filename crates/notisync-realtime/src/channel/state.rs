//! Connection state machine for the duplex channel.
//!
//! The machine owns the connection state, the consecutive-failure counter
//! and the give-up flag. It performs no I/O: every input is a
//! [`ChannelEvent`] and every output a [`ChannelAction`] the Channel
//! Manager carries out.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backoff::ReconnectPolicy;

/// Lifecycle state of the duplex connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and none being opened.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open and delivering events.
    Open,
    /// A normal closure is in progress.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Connection status as shown to the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Consecutive failed attempts.
    pub attempt: u32,
    /// Auto-retry stopped; a manual retry is needed.
    pub exhausted: bool,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// `connect()` was called.
    ConnectRequested,
    /// The transport finished its handshake.
    TransportOpened,
    /// Opening the transport failed.
    TransportFailed,
    /// An open transport closed or errored.
    TransportClosed,
    /// `disconnect()` was called or the session ended.
    DisconnectRequested,
    /// The transport was released after a requested close.
    TransportReleased,
    /// A scheduled retry delay elapsed.
    RetryElapsed,
    /// The user asked for a retry.
    ManualRetry,
    /// The server rejected the session credentials.
    AuthRejected,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open a new transport.
    OpenTransport,
    /// Re-issue every recorded subscription on the new transport.
    Resubscribe,
    /// Wait this long, then feed [`ChannelEvent::RetryElapsed`].
    ScheduleRetry(Duration),
    /// Stop retrying automatically; wait for a manual retry.
    GiveUp,
    /// Close the transport with a normal closure code.
    CloseTransport,
    /// Stop the channel worker.
    Stop,
    /// Nothing to do.
    None,
}

/// Typed state plus transition table.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ConnectionState,
    attempt: u32,
    exhausted: bool,
    retry_pending: bool,
    policy: ReconnectPolicy,
}

impl ChannelMachine {
    /// Create a disconnected machine.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            exhausted: false,
            retry_pending: false,
            policy,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the attempt cap was exceeded and auto-retry stopped.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Status snapshot.
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            attempt: self.attempt,
            exhausted: self.exhausted,
        }
    }

    /// Apply `event` and return the action to perform.
    pub fn handle(&mut self, event: ChannelEvent) -> ChannelAction {
        use ChannelEvent as E;
        use ConnectionState as S;

        match (self.state, event) {
            (S::Disconnected, E::ConnectRequested) => {
                self.attempt = 0;
                self.exhausted = false;
                self.begin_connect()
            }
            (S::Disconnected, E::RetryElapsed) if self.retry_pending => self.begin_connect(),
            (S::Disconnected, E::ManualRetry) => {
                self.attempt = 0;
                self.exhausted = false;
                self.begin_connect()
            }
            (S::Connecting, E::TransportOpened) => {
                self.state = S::Open;
                self.attempt = 0;
                self.exhausted = false;
                ChannelAction::Resubscribe
            }
            (S::Connecting, E::TransportFailed)
            | (S::Open, E::TransportFailed)
            | (S::Open, E::TransportClosed) => self.fail(),
            (S::Connecting | S::Open, E::DisconnectRequested) => {
                self.state = S::Closing;
                self.retry_pending = false;
                ChannelAction::CloseTransport
            }
            (S::Closing, E::TransportReleased | E::TransportClosed | E::TransportFailed) => {
                self.state = S::Disconnected;
                ChannelAction::Stop
            }
            (S::Disconnected, E::DisconnectRequested) => {
                self.retry_pending = false;
                ChannelAction::Stop
            }
            (_, E::AuthRejected) => {
                self.state = S::Disconnected;
                self.retry_pending = false;
                ChannelAction::Stop
            }
            _ => ChannelAction::None,
        }
    }

    fn begin_connect(&mut self) -> ChannelAction {
        self.state = ConnectionState::Connecting;
        self.retry_pending = false;
        ChannelAction::OpenTransport
    }

    fn fail(&mut self) -> ChannelAction {
        self.state = ConnectionState::Disconnected;
        self.attempt = self.attempt.saturating_add(1);
        match self.policy.delay_for(self.attempt) {
            Some(delay) => {
                self.retry_pending = true;
                ChannelAction::ScheduleRetry(delay)
            }
            None => {
                self.retry_pending = false;
                self.exhausted = true;
                ChannelAction::GiveUp
            }
        }
    }
}
