use crate::clock::{DAY_MS, HOUR_MS, MINUTE_MS, Millis};
use crate::error::AppError;
use crate::id::generate_id;
use crate::model::{
    ActionCode, ActionStyle, Notification, NotificationAction, NotificationKind,
};
use crate::storage::{KeyValueStore, keys, load_record, mirror_record};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub const MAX_NOTIFICATIONS: usize = 50;

/// Feed handle shared between the session and firing reminder timers.
pub type SharedFeed = Arc<Mutex<NotificationFeed>>;

pub fn lock_feed(feed: &SharedFeed) -> MutexGuard<'_, NotificationFeed> {
    feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Newest-first notices, capped at [`MAX_NOTIFICATIONS`].
pub struct NotificationFeed {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<Notification>,
}

impl NotificationFeed {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut entries: Vec<Notification> =
            load_record(store.as_ref(), keys::NOTIFICATIONS).unwrap_or_default();
        entries.truncate(MAX_NOTIFICATIONS);
        Self { store, entries }
    }

    pub fn shared(self) -> SharedFeed {
        Arc::new(Mutex::new(self))
    }

    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.read).count()
    }

    /// Prepends and returns the new unread count.
    pub fn add(&mut self, notification: Notification) -> usize {
        debug!(notification_id = %notification.id, kind = ?notification.kind, "notification added");
        self.entries.insert(0, notification);
        self.entries.truncate(MAX_NOTIFICATIONS);
        self.persist();
        self.unread_count()
    }

    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for entry in &mut self.entries {
            if !entry.read {
                entry.read = true;
                changed += 1;
            }
        }
        self.persist();
        changed
    }

    pub fn remove(&mut self, id: &str) -> Result<Notification, AppError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id.trim())
            .ok_or_else(|| AppError::not_found(format!("notification not found: {}", id.trim())))?;
        let removed = self.entries.remove(index);
        self.persist();
        Ok(removed)
    }

    pub fn clear_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.persist();
        removed
    }

    fn persist(&self) {
        mirror_record(self.store.as_ref(), keys::NOTIFICATIONS, &self.entries);
    }
}

pub fn reminder_notification(task_id: &str, task_title: &str, now: Millis) -> Notification {
    Notification {
        id: generate_id(),
        kind: NotificationKind::Reminder,
        title: "Reminder".to_string(),
        message: task_title.to_string(),
        timestamp: now,
        read: false,
        task_id: Some(task_id.to_string()),
        actions: vec![
            NotificationAction {
                label: "View task".to_string(),
                action: ActionCode::ViewTask,
                style: ActionStyle::Primary,
            },
            NotificationAction {
                label: "Snooze".to_string(),
                action: ActionCode::Snooze,
                style: ActionStyle::Secondary,
            },
        ],
    }
}

pub fn task_completed_notification(task_id: &str, task_title: &str, now: Millis) -> Notification {
    Notification {
        id: generate_id(),
        kind: NotificationKind::TaskCompleted,
        title: "Task completed".to_string(),
        message: task_title.to_string(),
        timestamp: now,
        read: false,
        task_id: Some(task_id.to_string()),
        actions: vec![NotificationAction {
            label: "View task".to_string(),
            action: ActionCode::ViewTask,
            style: ActionStyle::Primary,
        }],
    }
}

pub fn plain_notification(
    kind: NotificationKind,
    title: &str,
    message: &str,
    now: Millis,
) -> Notification {
    Notification {
        id: generate_id(),
        kind,
        title: title.to_string(),
        message: message.to_string(),
        timestamp: now,
        read: false,
        task_id: None,
        actions: Vec::new(),
    }
}

/// Relative age bucket: `now`, `{m}m`, `{h}h` or `{d}d`.
pub fn time_ago(timestamp: Millis, now: Millis) -> String {
    let elapsed = (now - timestamp).max(0);
    if elapsed < MINUTE_MS {
        "now".to_string()
    } else if elapsed < HOUR_MS {
        format!("{}m", elapsed / MINUTE_MS)
    } else if elapsed < DAY_MS {
        format!("{}h", elapsed / HOUR_MS)
    } else {
        format!("{}d", elapsed / DAY_MS)
    }
}
