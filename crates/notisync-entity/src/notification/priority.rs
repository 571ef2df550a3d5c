//! Notification priority levels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-assigned priority. Ordered so `>=` comparisons express
/// "at least this important".
///
/// Travels as a lowercase string; unknown values read as `Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationPriority {
    /// Background information.
    Low,
    /// Standard notification.
    #[default]
    Normal,
    /// Important; may raise an on-screen alert.
    High,
    /// Requires immediate attention.
    Urgent,
}

impl NotificationPriority {
    /// Parse from string, falling back to `Normal` for unknown values.
    pub fn from_str_value(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Normal,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Serialize for NotificationPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str_value(&raw))
    }
}
