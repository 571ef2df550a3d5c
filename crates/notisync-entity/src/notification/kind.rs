//! Notification kind enumeration.

use serde::{Deserialize, Serialize};

/// What a notification is about. Drives icon and routing only; the sync
/// logic treats every kind the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A new chat message.
    Message,
    /// Appointment booked, moved, or cancelled.
    Appointment,
    /// Escrow or milestone payment activity.
    Payment,
    /// A review was left.
    Review,
    /// Platform announcement.
    System,
    /// Account registration progress.
    Registration,
    /// Profile change confirmation.
    ProfileUpdate,
    /// Promotional content.
    Marketing,
    /// Any kind this client does not know yet.
    #[default]
    #[serde(other)]
    Other,
}

impl NotificationKind {
    /// Return the kind as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Appointment => "appointment",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::System => "system",
            Self::Registration => "registration",
            Self::ProfileUpdate => "profile-update",
            Self::Marketing => "marketing",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
