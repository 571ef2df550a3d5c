//! # notisync-source
//!
//! Data sources for the notification list and its mutations. Two modes:
//!
//! - **http**: the real REST backend, via [reqwest](https://crates.io/crates/reqwest)
//! - **fixture**: an in-memory list, optionally seeded from a JSON file
//!
//! The source is selected once, at construction time, from configuration.

pub mod fixture;
pub mod http;
pub mod provider;

pub use fixture::FixtureNotificationSource;
pub use http::HttpNotificationSource;
pub use provider::{NotificationSource, SourceManager};
