//! Key/value persistence for the session (`user` and `token`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage; forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Load `path` if it exists. An unreadable or corrupt file starts empty
    /// and is replaced on the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("pmap_storage_{}_{}", name, std::process::id()))
            .join("session.json")
    }

    #[test]
    fn memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        assert_eq!(store.get(TOKEN_KEY), None);
        store.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("abc"));
        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        let store = FileStorage::open(&path).unwrap();
        store.set(TOKEN_KEY, "abc").unwrap();
        store.set(USER_KEY, "{}").unwrap();
        store.remove(USER_KEY).unwrap();
        drop(store);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("abc"));
        assert_eq!(reopened.get(USER_KEY), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{{{ definitely not json").unwrap();

        let store = FileStorage::open(&path).unwrap();
        assert_eq!(store.get(TOKEN_KEY), None);
        store.set(TOKEN_KEY, "fresh").unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("fresh"));
    }
}
