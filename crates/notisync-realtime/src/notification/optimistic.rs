//! Optimistic mutations paired with their rollback.
//!
//! [`run_optimistic`] applies a [`Mutation`] locally, calls the backend,
//! and on failure applies the [`Undo`] recorded by that same local step.
//! Callers never build the inverse themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use notisync_core::error::AppError;
use notisync_core::result::AppResult;
use notisync_core::types::id::NotificationId;
use notisync_entity::Notification;

use super::store::NotificationStore;

/// A user-initiated change to the notification list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Mark one notification read.
    MarkRead(NotificationId),
    /// Mark every notification read.
    MarkAllRead,
    /// Delete one notification.
    Remove(NotificationId),
}

impl Mutation {
    /// Short operation name for logs and surfaced errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MarkRead(_) => "mark_read",
            Self::MarkAllRead => "mark_all_read",
            Self::Remove(_) => "remove",
        }
    }

    /// Apply to `store` and return what undoes it.
    pub fn apply(&self, store: &mut NotificationStore, now: DateTime<Utc>) -> Undo {
        match self {
            Self::MarkRead(id) => {
                if store.mark_read(id, now) {
                    Undo::MarkUnread(vec![id.clone()])
                } else {
                    Undo::Nothing
                }
            }
            Self::MarkAllRead => {
                let changed = store.mark_all_read(now);
                if changed.is_empty() {
                    Undo::Nothing
                } else {
                    Undo::MarkUnread(changed)
                }
            }
            Self::Remove(id) => match store.remove(id) {
                Some((index, notification)) => Undo::Restore {
                    index,
                    notification: Box::new(notification),
                },
                None => Undo::Nothing,
            },
        }
    }
}

/// Inverse of one applied [`Mutation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// The mutation changed nothing.
    Nothing,
    /// Revert these ids to unread.
    MarkUnread(Vec<NotificationId>),
    /// Put a removed notification back.
    Restore {
        /// Former position.
        index: usize,
        /// Removed value.
        notification: Box<Notification>,
    },
}

impl Undo {
    /// Whether there is nothing to undo.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// Apply the inverse to `store`.
    pub fn revert(self, store: &mut NotificationStore) {
        match self {
            Self::Nothing => {}
            Self::MarkUnread(ids) => store.mark_unread(&ids),
            Self::Restore {
                index,
                notification,
            } => store.restore(index, *notification),
        }
    }
}

/// Something that holds a store and can reach the backend.
#[async_trait]
pub trait OptimisticTarget: Send + Sync {
    /// Apply `mutation` to local state and publish it.
    fn apply_local(&self, mutation: &Mutation) -> Undo;

    /// Perform `mutation` on the backend.
    async fn commit_remote(&self, mutation: &Mutation) -> AppResult<()>;

    /// Undo a local change the backend refused.
    fn rollback(&self, mutation: &Mutation, undo: Undo, error: &AppError);
}

/// Apply locally, call remote, roll back on failure.
///
/// Returns `Ok(false)` without calling the backend when the local step
/// changed nothing.
pub async fn run_optimistic<T>(target: &T, mutation: Mutation) -> AppResult<bool>
where
    T: OptimisticTarget + ?Sized,
{
    let undo = target.apply_local(&mutation);
    if undo.is_noop() {
        debug!(operation = mutation.label(), "Mutation changed nothing locally");
        return Ok(false);
    }

    match target.commit_remote(&mutation).await {
        Ok(()) => Ok(true),
        Err(err) => {
            warn!(operation = mutation.label(), error = %err, "Rolling back optimistic mutation");
            target.rollback(&mutation, undo, &err);
            Err(err)
        }
    }
}
