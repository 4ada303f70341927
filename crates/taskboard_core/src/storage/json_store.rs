use crate::config::app_dir;
use crate::error::AppError;
use crate::storage::{DEFAULT_QUOTA_BYTES, KeyValueStore, validate_key};
use std::path::{Path, PathBuf};

const DATA_DIR_ENV_VAR: &str = "TASKBOARD_DATA_DIR";
const RECORD_EXTENSION: &str = "json";

pub fn data_dir() -> Result<PathBuf, AppError> {
    match std::env::var(DATA_DIR_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(app_dir()?.join("data")),
    }
}

/// One JSON file per key inside a data directory, bounded by a byte quota
/// over all records.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    fn bytes_used_excluding(&self, key: &str) -> Result<usize, AppError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let skip = self.record_path(key);
        let mut total = 0usize;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path == skip || path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION)
            {
                continue;
            }
            total += entry.metadata()?.len() as usize;
        }
        Ok(total)
    }
}

impl KeyValueStore for JsonDirStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        validate_key(key)?;
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let used = self.bytes_used_excluding(key)?;
        if used + value.len() > self.quota_bytes {
            return Err(AppError::quota_exceeded(format!(
                "storing {key} would exceed {} bytes",
                self.quota_bytes
            )));
        }

        std::fs::create_dir_all(&self.dir).map_err(|err| AppError::io(err.to_string()))?;
        let path = self.record_path(key);
        std::fs::write(&path, value).map_err(|err| AppError::io(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, permissions)
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        validate_key(key)?;
        let path = self.record_path(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|err| AppError::io(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::JsonDirStore;
    use crate::storage::KeyValueStore;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskboard-{nanos}-{name}"))
    }

    #[test]
    fn set_and_get_round_trip() {
        let dir = temp_dir("store-round-trip");
        let store = JsonDirStore::new(&dir);

        store.set("tasks", "[]").unwrap();
        let loaded = store.get("tasks").unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded.as_deref(), Some("[]"));
    }

    #[test]
    fn get_missing_key_returns_none() {
        let dir = temp_dir("store-missing");
        let store = JsonDirStore::new(&dir);
        assert_eq!(store.get("tasks").unwrap(), None);
    }

    #[test]
    fn remove_deletes_record() {
        let dir = temp_dir("store-remove");
        let store = JsonDirStore::new(&dir);

        store.set("session", "{}").unwrap();
        store.remove("session").unwrap();
        let loaded = store.get("session").unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded, None);
    }

    #[test]
    fn set_rejects_writes_over_quota() {
        let dir = temp_dir("store-quota");
        let store = JsonDirStore::new(&dir).with_quota(16);

        store.set("tags", "[\"a\",\"b\"]").unwrap();
        let err = store.set("tasks", "[\"0123456789\"]").unwrap_err();
        let untouched = store.get("tasks").unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(err.code(), "quota_exceeded");
        assert_eq!(untouched, None);
    }

    #[cfg(unix)]
    #[test]
    fn records_are_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = temp_dir("store-perms");
        let store = JsonDirStore::new(&dir);
        store.set("credentials", "{}").unwrap();
        let mode = fs::metadata(dir.join("credentials.json"))
            .unwrap()
            .permissions()
            .mode();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(mode & 0o777, 0o600);
    }
}
