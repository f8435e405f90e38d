//! Key-scoped, synchronous, string-only storage.
//!
//! [`MemoryStorage`] lives exactly as long as its process (one browsing
//! context). [`FileStorage`] keeps one file per key in a directory so several
//! processes can share a context; changes made by other processes are picked
//! up through [`crate::io::watch`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Failure of the backing storage. Never surfaced to users.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, capacity {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Synchronous string storage addressed by key.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage with an optional byte capacity.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            capacity_bytes: Some(capacity_bytes),
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capacity) = self.capacity_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > capacity {
                return Err(StorageError::QuotaExceeded { needed, capacity });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Directory-backed storage: key `k` lives in `{dir}/k.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    capacity_bytes: Option<usize>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            capacity_bytes: None,
        }
    }

    pub fn with_capacity_bytes(dir: impl Into<PathBuf>, capacity_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        key_path(&self.dir, key)
    }

    fn used_bytes_excluding(&self, excluded: &Path) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut total = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path == excluded || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                total += usize::try_from(meta.len()).unwrap_or(usize::MAX);
            }
        }
        Ok(total)
    }
}

/// Whether `key` can name a storage entry: non-empty ASCII alphanumerics,
/// `-`, and `_`, so a key can never escape the storage directory.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Path of the file holding `key` inside `dir`.
pub fn key_path(dir: &Path, key: &str) -> Result<PathBuf, StorageError> {
    if !is_valid_key(key) {
        return Err(StorageError::Unavailable(format!("invalid key '{key}'")));
    }
    Ok(dir.join(format!("{key}.json")))
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        if let Some(capacity) = self.capacity_bytes {
            let needed = self.used_bytes_excluding(&path)? + value.len();
            if needed > capacity {
                return Err(StorageError::QuotaExceeded { needed, capacity });
            }
        }
        debug!(path = %path.display(), bytes = value.len(), "writing storage key");
        write_atomic(&path, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Atomically replace `path` (temp file + rename).
fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(io_error(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(io_error(path))?;
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + use<> {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_get_set_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").expect("get"), None);
        storage.set("k", "v").expect("set");
        assert_eq!(storage.get("k").expect("get").as_deref(), Some("v"));
        storage.remove("k").expect("remove");
        storage.remove("k").expect("remove twice");
        assert_eq!(storage.get("k").expect("get"), None);
    }

    /// Overwriting a key only counts the new value against capacity.
    #[test]
    fn memory_storage_enforces_capacity() {
        let storage = MemoryStorage::with_capacity_bytes(10);
        storage.set("k", "123456").expect("fits");
        storage.set("k", "1234567").expect("overwrite fits");
        let err = storage.set("k", "1234567890").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(storage.get("k").expect("get").as_deref(), Some("1234567"));
    }

    #[test]
    fn file_storage_round_trips_and_tolerates_missing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(temp.path().join("nested").join("storage"));
        assert_eq!(storage.get("history").expect("get"), None);
        storage.set("history", "[]").expect("set");
        assert_eq!(storage.get("history").expect("get").as_deref(), Some("[]"));
        storage.remove("history").expect("remove");
        assert_eq!(storage.get("history").expect("get"), None);
    }

    #[test]
    fn file_storage_enforces_capacity_across_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::with_capacity_bytes(temp.path(), 8);
        storage.set("a", "1234").expect("set a");
        storage.set("b", "1234").expect("set b");
        let err = storage.set("c", "1").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded {
                needed: 9,
                capacity: 8
            }
        ));
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(temp.path());
        assert!(matches!(
            storage.set("../escape", "x"),
            Err(StorageError::Unavailable(_))
        ));
    }
}
