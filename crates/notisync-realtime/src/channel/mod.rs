//! Channel lifecycle: reconnect policy, state machine, and subscriptions.

pub mod backoff;
pub mod state;
pub mod subscription;

pub use backoff::ReconnectPolicy;
pub use state::{ChannelAction, ChannelEvent, ChannelMachine, ChannelStatus, ConnectionState};
pub use subscription::SubscriptionSet;
