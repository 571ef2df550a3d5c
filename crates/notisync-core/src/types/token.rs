//! Bearer token shared by the REST source and the duplex channel.

use std::fmt;
use std::sync::{Arc, RwLock};

/// Shared, swappable bearer token for one authenticated session.
///
/// Cloning yields another handle to the same token, so a
/// re-authentication is immediately visible to every holder.
#[derive(Clone, Default)]
pub struct SessionToken {
    inner: Arc<RwLock<String>>,
}

impl SessionToken {
    /// Create a token handle holding `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token.into())),
        }
    }

    /// Current token value.
    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the token value.
    pub fn set(&self, token: impl Into<String>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = token.into();
    }

    /// Whether a non-empty token is present.
    pub fn is_present(&self) -> bool {
        !self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .trim()
            .is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("present", &self.is_present())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_value() {
        let token = SessionToken::new("abc");
        let other = token.clone();
        other.set("def");
        assert_eq!(token.get(), "def");
    }

    #[test]
    fn test_presence() {
        assert!(!SessionToken::default().is_present());
        assert!(!SessionToken::new("  ").is_present());
        assert!(SessionToken::new("t").is_present());
    }

    #[test]
    fn test_debug_hides_value() {
        let token = SessionToken::new("secret-value");
        assert!(!format!("{token:?}").contains("secret-value"));
    }
}
