//! Topics the client believes it is subscribed to.

use std::sync::Mutex;

use notisync_core::result::AppResult;

use crate::message::validator::validate_channel_name;

/// Ordered set of logical topics, re-issued on every new connection.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    topics: Mutex<Vec<String>>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a topic. Returns `false` if it was already present.
    pub fn add(&self, topic: &str) -> AppResult<bool> {
        validate_channel_name(topic)?;
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if topics.iter().any(|t| t == topic) {
            return Ok(false);
        }
        topics.push(topic.to_string());
        Ok(true)
    }

    /// Forgets a topic. Returns `false` if it was not present.
    pub fn remove(&self, topic: &str) -> bool {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let before = topics.len();
        topics.retain(|t| t != topic);
        topics.len() != before
    }

    /// Whether `topic` is recorded.
    pub fn contains(&self, topic: &str) -> bool {
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|t| t == topic)
    }

    /// Recorded topics in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded topics.
    pub fn len(&self) -> usize {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no topics are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
