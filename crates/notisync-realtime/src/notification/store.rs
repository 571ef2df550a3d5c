//! Notification Store: the notification list and its unread count.
//!
//! Every operation updates the list and the count together and performs
//! no I/O. The count is maintained incrementally and always equals the
//! number of held notifications with `read == false`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use notisync_core::types::id::NotificationId;
use notisync_entity::Notification;

/// Single source of truth for the notification list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationStore {
    items: Vec<Notification>,
    unread: usize,
}

impl NotificationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `items`.
    pub fn from_items(items: Vec<Notification>) -> Self {
        let mut store = Self::new();
        store.replace_all(items);
        store
    }

    /// Held notifications, in display order.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Number of held notifications.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up a notification.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    /// Whether `id` is held.
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &NotificationId) -> Option<usize> {
        self.items.iter().position(|n| &n.id == id)
    }

    /// Replace the whole set with an authoritative list.
    ///
    /// Duplicate ids keep their first occurrence. Local alert markers
    /// survive for ids present before and after.
    pub fn replace_all(&mut self, list: Vec<Notification>) {
        let alerted: HashSet<NotificationId> = self
            .items
            .iter()
            .filter(|n| n.alerted)
            .map(|n| n.id.clone())
            .collect();

        let mut seen = HashSet::with_capacity(list.len());
        let mut items = Vec::with_capacity(list.len());
        for mut notification in list {
            if !seen.insert(notification.id.clone()) {
                continue;
            }
            notification.alerted = notification.alerted || alerted.contains(&notification.id);
            items.push(notification);
        }

        self.unread = items.iter().filter(|n| !n.read).count();
        self.items = items;
    }

    /// Insert a pushed notification at the front, or merge it into the
    /// held copy. A held notification that is read stays read.
    ///
    /// Returns `true` if the notification was new.
    pub fn upsert(&mut self, notification: Notification) -> bool {
        match self.position(&notification.id) {
            Some(index) => {
                let existing = &mut self.items[index];
                let was_unread = !existing.read;
                existing.merge_from(notification);
                if was_unread && existing.read {
                    self.unread -= 1;
                }
                false
            }
            None => {
                if !notification.read {
                    self.unread += 1;
                }
                self.items.insert(0, notification);
                true
            }
        }
    }

    /// Mark one notification read at `now`. Idempotent.
    ///
    /// Returns `true` if it changed.
    pub fn mark_read(&mut self, id: &NotificationId, now: DateTime<Utc>) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                n.read_at = Some(now);
                self.unread -= 1;
                true
            }
            _ => false,
        }
    }

    /// Mark every notification read at `now`. Idempotent.
    ///
    /// Returns the ids that changed.
    pub fn mark_all_read(&mut self, now: DateTime<Utc>) -> Vec<NotificationId> {
        let mut changed = Vec::new();
        for n in self.items.iter_mut().filter(|n| !n.read) {
            n.read = true;
            n.read_at = Some(now);
            changed.push(n.id.clone());
        }
        self.unread = 0;
        changed
    }

    /// Revert notifications to unread. Used to roll back an optimistic
    /// read that the server refused.
    pub fn mark_unread(&mut self, ids: &[NotificationId]) {
        for n in self.items.iter_mut().filter(|n| n.read && ids.contains(&n.id)) {
            n.read = false;
            n.read_at = None;
            self.unread += 1;
        }
    }

    /// Delete a notification.
    ///
    /// Returns its former position and value.
    pub fn remove(&mut self, id: &NotificationId) -> Option<(usize, Notification)> {
        let index = self.position(id)?;
        let removed = self.items.remove(index);
        if !removed.read {
            self.unread -= 1;
        }
        Some((index, removed))
    }

    /// Put a removed notification back at `index` (clamped). No-op if the
    /// id is held again by now.
    pub fn restore(&mut self, index: usize, notification: Notification) {
        if self.contains(&notification.id) {
            return;
        }
        if !notification.read {
            self.unread += 1;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, notification);
    }

    /// Set the local alert marker. Returns `true` if it was not set.
    pub fn mark_alerted(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.alerted => {
                n.alerted = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn note(id: &str) -> Notification {
        Notification::new(id, format!("title {id}"), "body", Utc::now())
    }

    fn read_note(id: &str) -> Notification {
        note(id).with_read_at(Utc::now())
    }

    fn assert_count(store: &NotificationStore) {
        let actual = store.items().iter().filter(|n| !n.read).count();
        assert_eq!(store.unread_count(), actual, "unread count drifted");
    }

    #[test]
    fn test_replace_all_counts_and_dedups() {
        let mut store = NotificationStore::new();
        store.replace_all(vec![note("a"), read_note("b"), note("a"), note("c")]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.unread_count(), 2);
        assert_count(&store);
    }

    #[test]
    fn test_replace_all_keeps_alert_markers() {
        let mut store = NotificationStore::from_items(vec![note("a"), note("b")]);
        store.mark_alerted(&"a".into());
        store.replace_all(vec![note("a"), note("c")]);
        assert!(store.get(&"a".into()).unwrap().alerted);
        assert!(!store.get(&"c".into()).unwrap().alerted);
        assert!(!store.contains(&"b".into()));
    }

    #[test]
    fn test_upsert_prepends_new() {
        let mut store = NotificationStore::from_items(vec![note("a")]);
        assert!(store.upsert(note("b")));
        assert_eq!(store.items()[0].id.as_str(), "b");
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_upsert_never_unreads() {
        let mut store = NotificationStore::from_items(vec![note("a")]);
        store.mark_read(&"a".into(), Utc::now());
        assert!(!store.upsert(note("a")));
        assert!(store.get(&"a".into()).unwrap().read);
        assert_eq!(store.unread_count(), 0);
        assert_count(&store);
    }

    #[test]
    fn test_upsert_duplicate_read_push_decrements() {
        let mut store = NotificationStore::from_items(vec![note("a"), note("b")]);
        store.upsert(read_note("a"));
        assert_eq!(store.unread_count(), 1);
        assert_count(&store);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut store = NotificationStore::from_items(vec![note("a"), note("b")]);
        let now = Utc::now();
        assert!(store.mark_read(&"a".into(), now));
        let once = store.clone();
        assert!(!store.mark_read(&"a".into(), now + Duration::seconds(5)));
        assert_eq!(store, once);
        assert!(!store.mark_read(&"missing".into(), now));
    }

    #[test]
    fn test_mark_all_read_is_idempotent() {
        let mut store = NotificationStore::from_items(vec![note("a"), read_note("b"), note("c")]);
        let now = Utc::now();
        assert_eq!(store.mark_all_read(now).len(), 2);
        let once = store.clone();
        assert!(store.mark_all_read(now).is_empty());
        assert_eq!(store, once);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_remove_and_restore() {
        let mut store = NotificationStore::from_items(vec![note("a"), note("b"), read_note("c")]);
        let (index, removed) = store.remove(&"b".into()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(store.unread_count(), 1);

        store.restore(index, removed);
        assert_eq!(store.items()[1].id.as_str(), "b");
        assert_eq!(store.unread_count(), 2);

        assert!(store.remove(&"c".into()).is_some());
        assert_eq!(store.unread_count(), 2);
        assert!(store.remove(&"c".into()).is_none());
    }

    #[test]
    fn test_mark_unread_reverts() {
        let mut store = NotificationStore::from_items(vec![note("a"), note("b")]);
        let changed = store.mark_all_read(Utc::now());
        store.mark_unread(&changed);
        assert_eq!(store.unread_count(), 2);
        assert!(store.items().iter().all(|n| n.read_at.is_none()));
    }

    #[test]
    fn test_count_invariant_over_mixed_sequence() {
        let mut store = NotificationStore::new();
        let now = Utc::now();
        let ids = ["a", "b", "c", "d", "e"];

        for (step, id) in ids.iter().cycle().take(60).enumerate() {
            let id: NotificationId = (*id).into();
            match step % 7 {
                0 => {
                    store.upsert(note(id.as_str()));
                }
                1 => {
                    store.mark_read(&id, now);
                }
                2 => {
                    store.upsert(read_note(id.as_str()));
                }
                3 => {
                    store.remove(&id);
                }
                4 => {
                    store.mark_all_read(now);
                }
                5 => store.replace_all(vec![note("a"), read_note("c"), note("e")]),
                _ => {
                    if let Some((index, n)) = store.remove(&id) {
                        store.restore(index, n);
                    }
                }
            }
            assert_count(&store);
        }
    }
}
