//! Key-value persistence. Each logical record lives under its own key and is
//! read and written independently; there is no cross-key atomicity.

pub mod json_store;
pub mod memory_store;

use crate::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use json_store::JsonDirStore;
pub use memory_store::MemoryStore;

pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const TAGS: &str = "tags";
    pub const ACTIVITIES: &str = "activities";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const USERS: &str = "users";
    pub const CREDENTIALS: &str = "credentials";
    pub const SESSION: &str = "session";
    pub const LOGIN_ATTEMPTS: &str = "login_attempts";
    pub const PROFILES: &str = "profiles";
    pub const AVATARS: &str = "avatars";
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// Reads and decodes a record. Absent, unreadable or corrupt records yield
/// `None` so callers can fall back to their defaults.
pub fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "failed to read record");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "ignoring corrupt record");
            None
        }
    }
}

/// Encodes and writes a record, surfacing the failure to the caller.
pub fn save_record<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, &encoded)
}

/// Best-effort mirror write: failures (quota, permissions) are logged and
/// dropped, the in-memory state stays authoritative.
pub fn mirror_record<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    if let Err(err) = save_record(store, key, value) {
        warn!(key, code = err.code(), error = %err, "record not persisted");
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!("invalid storage key: {key}")))
    }
}
