//! Identifier types.
//!
//! Server-owned records use [`NotificationId`], an opaque string, because
//! the backend decides its format. Client-local records (alerts, surfaced
//! errors) use newtype wrappers around [`uuid::Uuid`] generated by
//! `define_id!`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque, stable identifier of a server-owned notification.
///
/// Accepts both JSON strings and JSON integers on input and always
/// serializes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for NotificationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s.is_empty() => Err(serde::de::Error::custom(
                "notification id must not be empty",
            )),
            Raw::Text(s) => Ok(Self(s)),
            Raw::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

/// Macro to define a newtype ID wrapper around `Uuid`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner UUID value.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifier of an on-screen alert.
    AlertId
);

define_id!(
    /// Identifier of a user-visible, dismissible error.
    ErrorId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_id_from_string_and_number() {
        let a: NotificationId = serde_json::from_str("\"n-42\"").expect("string id");
        let b: NotificationId = serde_json::from_str("42").expect("numeric id");
        assert_eq!(a.as_str(), "n-42");
        assert_eq!(b.as_str(), "42");
        assert_eq!(serde_json::to_string(&b).expect("serialize"), "\"42\"");
    }

    #[test]
    fn test_notification_id_rejects_empty() {
        assert!(serde_json::from_str::<NotificationId>("\"\"").is_err());
        assert!(serde_json::from_str::<NotificationId>("null").is_err());
    }

    #[test]
    fn test_alert_ids_are_unique() {
        assert_ne!(AlertId::new(), AlertId::new());
    }

    #[test]
    fn test_error_id_from_str() {
        let uuid = Uuid::new_v4();
        let id: ErrorId = uuid.to_string().parse().expect("should parse");
        assert_eq!(id.into_uuid(), uuid);
    }
}
