use crate::error::AppError;
use crate::storage::{KeyValueStore, validate_key};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store with an optional byte quota; used by tests and ephemeral
/// sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        validate_key(key)?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let mut entries = self.entries();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(AppError::quota_exceeded(format!(
                    "storing {key} would exceed {quota} bytes"
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        validate_key(key)?;
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::storage::KeyValueStore;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("tasks", "[]").unwrap();
        assert_eq!(store.get("tasks").unwrap().as_deref(), Some("[]"));
        store.remove("tasks").unwrap();
        assert_eq!(store.get("tasks").unwrap(), None);
    }

    #[test]
    fn quota_counts_other_keys_but_not_the_replaced_value() {
        let store = MemoryStore::with_quota(20);
        store.set("a", "0123456789").unwrap();
        store.set("a", "9876543210").unwrap();
        let err = store.set("b", "0123456789").unwrap_err();
        assert_eq!(err.code(), "quota_exceeded");
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn rejects_invalid_keys() {
        let store = MemoryStore::new();
        assert_eq!(store.get("../etc").unwrap_err().code(), "invalid_input");
    }
}
