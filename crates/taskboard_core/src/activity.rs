use crate::clock::Millis;
use crate::id::generate_id;
use crate::model::{Activity, ActivityKind, Task};
use crate::storage::{KeyValueStore, keys, load_record, mirror_record};
use std::sync::Arc;

pub const MAX_ACTIVITIES: usize = 100;

/// Newest-first audit trail, capped at [`MAX_ACTIVITIES`].
pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<Activity>,
}

impl ActivityLog {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut entries: Vec<Activity> =
            load_record(store.as_ref(), keys::ACTIVITIES).unwrap_or_default();
        entries.truncate(MAX_ACTIVITIES);
        Self { store, entries }
    }

    pub fn entries(&self) -> &[Activity] {
        &self.entries
    }

    pub fn recent(&self, limit: usize) -> &[Activity] {
        &self.entries[..limit.min(self.entries.len())]
    }

    pub fn record(
        &mut self,
        kind: ActivityKind,
        task: Option<&Task>,
        details: Option<String>,
        now: Millis,
    ) -> Activity {
        let activity = Activity {
            id: generate_id(),
            kind,
            task_id: task.map(|task| task.id.clone()),
            task_title: task.map(|task| task.title.clone()),
            timestamp: now,
            details,
        };
        self.entries.insert(0, activity.clone());
        self.entries.truncate(MAX_ACTIVITIES);
        self.persist();
        activity
    }

    pub fn replace_all(&mut self, mut entries: Vec<Activity>) {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(MAX_ACTIVITIES);
        self.entries = entries;
        self.persist();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    fn persist(&self) {
        mirror_record(self.store.as_ref(), keys::ACTIVITIES, &self.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityLog, MAX_ACTIVITIES};
    use crate::model::{Activity, ActivityKind, Task};
    use crate::storage::{MemoryStore, keys, load_record};
    use std::sync::Arc;

    #[test]
    fn record_prepends_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ActivityLog::load(store.clone());
        let task = Task::new("t1".into(), "demo".into(), 1);

        log.record(ActivityKind::Create, Some(&task), None, 10);
        let latest = log.record(ActivityKind::Edit, Some(&task), Some("renamed".into()), 20);

        assert_eq!(log.entries()[0], latest);
        assert_eq!(log.entries()[1].kind, ActivityKind::Create);
        assert_eq!(latest.task_title.as_deref(), Some("demo"));

        let stored: Vec<Activity> = load_record(store.as_ref(), keys::ACTIVITIES).unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn log_is_capped_and_drops_oldest() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ActivityLog::load(store);

        for index in 0..MAX_ACTIVITIES {
            log.record(ActivityKind::Create, None, Some(format!("#{index}")), index as i64);
        }
        assert_eq!(log.entries().len(), MAX_ACTIVITIES);

        let newest = log.record(ActivityKind::Delete, None, Some("#100".into()), 1_000);
        assert_eq!(log.entries().len(), MAX_ACTIVITIES);
        assert_eq!(log.entries()[0], newest);
        assert!(
            !log.entries()
                .iter()
                .any(|entry| entry.details.as_deref() == Some("#0"))
        );
    }

    #[test]
    fn serializes_kind_as_type_field() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ActivityLog::load(store);
        let entry = log.record(ActivityKind::ClearDone, None, None, 5);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "clear_done");
        assert_eq!(value["timestamp"], 5);
    }

    #[test]
    fn recent_limits_slice() {
        let store = Arc::new(MemoryStore::new());
        let mut log = ActivityLog::load(store);
        log.record(ActivityKind::Export, None, None, 1);
        log.record(ActivityKind::Import, None, None, 2);
        assert_eq!(log.recent(1).len(), 1);
        assert_eq!(log.recent(10).len(), 2);
    }
}
