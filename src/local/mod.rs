// Device-local persistence: identity, reading progress, favourites and preferences.
// Nothing here is reconciled with the server.
mod device;
mod prefs;
mod progress;
mod stats;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

pub use self::device::{device_id, DEVICE_ID_KEY, SERVER_SENTINEL};
pub use self::prefs::{normalize_username, Preferences, Theme};
pub use self::progress::{percent_complete, ComicProgress, ContinuePointer, ProgressStore};
pub use self::stats::{Badge, ReadingStats, BADGES};

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// String key/value storage scoped to one device profile.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

#[derive(Default)]
pub struct MemoryKv {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.values
            .lock()
            .map_err(|_| LocalStoreError::Poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.values
            .lock()
            .map_err(|_| LocalStoreError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file, rewritten on every change.
///
/// A missing or unreadable file starts out empty. Non-string values left by an
/// older file are kept as their JSON text, and nulls are dropped.
pub struct FileKv {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileKv {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let raw: BTreeMap<String, serde_json::Value> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let values = raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    // Changes only become visible once the file write succeeded
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut values = self.values.lock().map_err(|_| LocalStoreError::Poisoned)?;
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut values = self.values.lock().map_err(|_| LocalStoreError::Poisoned)?;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_kv_set_get_remove() {
        let kv = MemoryKv::new();
        assert!(kv.get("theme").is_none());
        kv.set("theme", "void").unwrap();
        assert_eq!(kv.get("theme").as_deref(), Some("void"));
        kv.remove("theme").unwrap();
        assert!(kv.get("theme").is_none());
    }

    #[test]
    fn file_kv_persists_across_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/local.json");

        let kv = FileKv::open(&path);
        kv.set("username", "alice").unwrap();
        drop(kv);

        let reopened = FileKv::open(&path);
        assert_eq!(reopened.get("username").as_deref(), Some("alice"));
    }

    #[test]
    fn file_kv_with_garbage_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("local.json");
        std::fs::write(&path, "not json at all").unwrap();

        let kv = FileKv::open(&path);
        assert!(kv.get("username").is_none());
        kv.set("username", "bob").unwrap();
        assert_eq!(FileKv::open(&path).get("username").as_deref(), Some("bob"));
    }

    #[test]
    fn file_kv_keeps_string_keys_next_to_other_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("local.json");
        std::fs::write(
            &path,
            r#"{"device_id":"dev-abc","continue_enabled":true,"stale":null}"#,
        )
        .unwrap();

        let kv = FileKv::open(&path);
        assert_eq!(kv.get("device_id").as_deref(), Some("dev-abc"));
        assert_eq!(kv.get("continue_enabled").as_deref(), Some("true"));
        assert!(kv.get("stale").is_none());

        kv.set("theme", "void").unwrap();
        let reopened = FileKv::open(&path);
        assert_eq!(reopened.get("device_id").as_deref(), Some("dev-abc"));
        assert_eq!(reopened.get("theme").as_deref(), Some("void"));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        // The parent path is a file, so every flush fails
        let kv = FileKv::open(blocker.join("local.json"));
        assert!(kv.set("theme", "void").is_err());
        assert!(kv.get("theme").is_none());

        let first = device_id(Some(&kv));
        let second = device_id(Some(&kv));
        assert!(first.starts_with("dev-"));
        assert!(second.starts_with("dev-"));
        assert!(kv.get(DEVICE_ID_KEY).is_none());
    }

    #[test]
    fn failed_remove_keeps_the_value() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("profile");
        let path = dir.join("local.json");

        let kv = FileKv::open(&path);
        kv.set("theme", "void").unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "").unwrap();
        assert!(kv.remove("theme").is_err());
        assert_eq!(kv.get("theme").as_deref(), Some("void"));
    }
}
