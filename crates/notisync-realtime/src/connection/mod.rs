//! Duplex connection management: transports, keepalive, and the Channel Manager.

pub mod heartbeat;
pub mod manager;
pub mod memory;
pub mod transport;
pub mod websocket;

pub use manager::{ChannelListener, ChannelManager, ChannelSettings};
pub use memory::MemoryTransport;
pub use transport::{
    ChannelEndpoint, Connection, Frame, NORMAL_CLOSURE, Transport, TransportError,
    build_transport,
};
pub use websocket::WebSocketTransport;
