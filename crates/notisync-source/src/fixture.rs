//! In-memory notification source.
//!
//! Stands in for the backend when running offline or in tests. It holds
//! the authoritative list itself, so mutations behave like the real
//! server would, and it can be told to fail in the ways the real
//! backend fails.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;
use notisync_core::types::id::NotificationId;
use notisync_core::types::pagination::{PageRequest, PageResponse};
use notisync_entity::Notification;

use crate::provider::NotificationSource;

/// Fixture-backed [`NotificationSource`].
#[derive(Debug, Default)]
pub struct FixtureNotificationSource {
    /// Authoritative list, newest first.
    items: Mutex<Vec<Notification>>,
    /// When set, every call fails with this kind.
    failure: Mutex<Option<ErrorKind>>,
    /// When set, only mutations fail with this kind.
    mutation_failure: Mutex<Option<ErrorKind>>,
    /// Number of `fetch_page` calls served.
    fetches: AtomicU64,
}

impl FixtureNotificationSource {
    /// Create a source holding `items`.
    pub fn new(items: Vec<Notification>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Load a JSON array of notifications from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!(
                "Failed to read fixture file '{}': {e}",
                path.display()
            ))
        })?;
        let items: Vec<Notification> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), count = items.len(), "Loaded notification fixtures");
        Ok(Self::new(items))
    }

    /// Snapshot of the authoritative list.
    pub fn items(&self) -> Vec<Notification> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the authoritative list.
    pub fn set_items(&self, items: Vec<Notification>) {
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    /// Add a notification at the front of the list, as the server would
    /// on creation.
    pub fn push(&self, notification: Notification) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(0, notification);
    }

    /// Make every subsequent call fail with `kind` (or succeed with `None`).
    pub fn fail_all(&self, kind: Option<ErrorKind>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = kind;
    }

    /// Make subsequent mutations fail with `kind` (or succeed with `None`).
    pub fn fail_mutations(&self, kind: Option<ErrorKind>) {
        *self.mutation_failure.lock().unwrap_or_else(|e| e.into_inner()) = kind;
    }

    /// Number of pages served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn check(&self, mutation: bool) -> AppResult<()> {
        let failure = *self.failure.lock().unwrap_or_else(|e| e.into_inner());
        let failure = match failure {
            Some(kind) => Some(kind),
            None if mutation => *self.mutation_failure.lock().unwrap_or_else(|e| e.into_inner()),
            None => None,
        };
        match failure {
            Some(kind) => Err(AppError::new(kind, format!("Fixture configured to fail ({kind})"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationSource for FixtureNotificationSource {
    async fn fetch_page(&self, page: &PageRequest) -> AppResult<PageResponse<Notification>> {
        self.check(false)?;
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let start = ((page.page.saturating_sub(1)) * page.page_size) as usize;
        let slice: Vec<Notification> = items
            .iter()
            .skip(start)
            .take(page.page_size as usize)
            .cloned()
            .collect();

        Ok(PageResponse::new(
            slice,
            page.page,
            page.page_size,
            items.len() as u64,
        ))
    }

    async fn mark_read(&self, id: &NotificationId) -> AppResult<()> {
        self.check(true)?;
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let item = items
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;
        if !item.read {
            item.read = true;
            item.read_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> AppResult<()> {
        self.check(true)?;
        let now = Utc::now();
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        for item in items.iter_mut().filter(|n| !n.read) {
            item.read = true;
            item.read_at = Some(now);
        }
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> AppResult<()> {
        self.check(true)?;
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|n| &n.id != id);
        if items.len() == before {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        Ok(())
    }
}
