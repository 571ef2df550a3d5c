//! Notification domain entities.

pub mod kind;
pub mod model;
pub mod priority;

pub use kind::NotificationKind;
pub use model::Notification;
pub use priority::NotificationPriority;
