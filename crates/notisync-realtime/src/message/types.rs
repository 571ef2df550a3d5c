//! Server-pushed envelopes and client-sent messages on the duplex channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notisync_core::types::id::NotificationId;
use notisync_entity::Notification;

/// Envelopes pushed by the server, tagged by `type`.
///
/// `created` carries the notification fields next to the tag, so the
/// envelope body is itself a notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// A notification was created.
    Created(Notification),
    /// A notification was read, possibly on another device.
    Read {
        /// Notification ID.
        id: NotificationId,
        /// When it was read.
        #[serde(default, rename = "readAt")]
        read_at: Option<DateTime<Utc>>,
    },
    /// A notification was deleted.
    Deleted {
        /// Notification ID.
        id: NotificationId,
    },
    /// Application-level keepalive.
    Ping {
        /// Server timestamp, echoed back in the pong.
        timestamp: i64,
    },
}

/// Store-affecting events routed to the Notification Store.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Upsert this notification.
    Created(Notification),
    /// Mark this notification read.
    Read {
        /// Notification ID.
        id: NotificationId,
        /// Server read time, if sent.
        read_at: Option<DateTime<Utc>>,
    },
    /// Remove this notification.
    Deleted {
        /// Notification ID.
        id: NotificationId,
    },
}

impl ServerEvent {
    /// The notification this event refers to.
    pub fn notification_id(&self) -> &NotificationId {
        match self {
            Self::Created(n) => &n.id,
            Self::Read { id, .. } | Self::Deleted { id } => id,
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Read { .. } => "read",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// Result of parsing one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// An event for the store.
    Event(ServerEvent),
    /// A keepalive to answer with a pong.
    Ping {
        /// Timestamp to echo.
        timestamp: i64,
    },
    /// A well-formed envelope of a type this client does not handle.
    Ignored(String),
}

impl From<ServerEnvelope> for Inbound {
    fn from(envelope: ServerEnvelope) -> Self {
        match envelope {
            ServerEnvelope::Created(n) => Self::Event(ServerEvent::Created(n)),
            ServerEnvelope::Read { id, read_at } => Self::Event(ServerEvent::Read { id, read_at }),
            ServerEnvelope::Deleted { id } => Self::Event(ServerEvent::Deleted { id }),
            ServerEnvelope::Ping { timestamp } => Self::Ping { timestamp },
        }
    }
}

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a topic.
    Subscribe {
        /// Topic name.
        channel: String,
    },
    /// Unsubscribe from a topic.
    Unsubscribe {
        /// Topic name.
        channel: String,
    },
    /// Pong response to server ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
}
