//! # notisync-realtime
//!
//! Client-side notification sync for one authenticated session:
//!
//! - Duplex channel with reconnect backoff, heartbeats and resubscription
//! - Notification store with optimistic mutations and rollback
//! - Priority alerts gated by recency
//! - Polling fallback that repairs anything the channel missed
//!
//! [`NotificationSession`] ties these together and publishes a consistent
//! [`SessionSnapshot`] after every change.

pub mod channel;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod notification;
pub mod polling;
pub mod session;

pub use channel::{ChannelStatus, ConnectionState};
pub use connection::{ChannelManager, MemoryTransport, Transport, build_transport};
pub use notification::{Alert, AlertPolicy, NotificationStore};
pub use session::{NotificationSession, SessionSettings, SessionSnapshot, SurfacedError};
