//! # notisync-entity
//!
//! Domain models for Notisync. The backend owns every record here; the
//! client only flips the read flag (optimistically) and keeps a local
//! alert marker that never leaves the process.

pub mod notification;

pub use notification::{Notification, NotificationKind, NotificationPriority};
