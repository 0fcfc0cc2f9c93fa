//! Durable key-value storage for the timer record.
//!
//! The reconciler only needs integer values under a handful of keys, so the
//! store contract is deliberately narrow: `get` returns `None` for a key that
//! was never written and callers substitute their documented default.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "values": {
//!     "timer.state": 0,
//!     "timer.seconds_remaining": 421
//!   }
//! }
//! ```
//!
//! A missing, empty, corrupt or wrong-version file loads as an empty store.
//! Writes go through a temp file + rename so a crash never leaves a torn file.

use fs_err as fs;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;

const STORE_FILE_VERSION: u32 = 1;

/// Durable, synchronous, process-independent key-value access.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.set_many(&[(key, value)])
    }

    /// Write several keys as one durable update.
    fn set_many(&self, entries: &[(&str, i64)]) -> Result<(), StoreError>;
}

/// Volatile store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(values.get(key).copied())
    }

    fn set_many(&self, entries: &[(&str, i64)]) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        for (key, value) in entries {
            values.insert((*key).to_string(), *value);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    values: HashMap<String, i64>,
}

/// JSON-file-backed store. Every write rewrites the whole file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, i64>>,
}

impl FileStore {
    /// Open the store at `path`, creating its parent directory if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let values = Self::read_values(path)?;
        debug!("Opened timer store at {} ({} keys)", path.display(), values.len());

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_values(path: &Path) -> Result<HashMap<String, i64>, StoreError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            warn!("Empty timer store file, starting from defaults");
            return Ok(HashMap::new());
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == STORE_FILE_VERSION => Ok(file.values),
            Ok(file) => {
                warn!(
                    version = file.version,
                    "Unsupported timer store version, starting from defaults"
                );
                Ok(HashMap::new())
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse timer store, starting from defaults");
                Ok(HashMap::new())
            }
        }
    }

    fn write_values(&self, values: &HashMap<String, i64>) -> Result<(), StoreError> {
        let file = StoreFile {
            version: STORE_FILE_VERSION,
            values: values.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let parent_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent_dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StoreError::Persist(e.error.to_string()))?;
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(values.get(key).copied())
    }

    fn set_many(&self, entries: &[(&str, i64)]) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut next = values.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), *value);
        }
        // Only adopt the new values once they are on disk.
        self.write_values(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("timer.streak").unwrap(), None);
    }

    #[test]
    fn memory_store_set_overwrites() {
        let store = MemoryStore::new();
        store.set("timer.streak", 2).unwrap();
        store.set("timer.streak", 3).unwrap();
        assert_eq!(store.get("timer.streak").unwrap(), Some(3));
    }

    #[test]
    fn file_store_survives_reopen() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("state.json");

        {
            let store = FileStore::open(&file).unwrap();
            store
                .set_many(&[("timer.state", 1), ("timer.streak", 7)])
                .unwrap();
        }

        let store = FileStore::open(&file).unwrap();
        assert_eq!(store.get("timer.state").unwrap(), Some(1));
        assert_eq!(store.get("timer.streak").unwrap(), Some(7));
    }

    #[test]
    fn file_store_creates_parent_directory() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("nested").join("dir").join("state.json");

        let store = FileStore::open(&file).unwrap();
        store.set("timer.streak", 1).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn file_store_empty_file_loads_empty() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("empty.json");
        fs::write(&file, "").unwrap();

        let store = FileStore::open(&file).unwrap();
        assert_eq!(store.get("timer.state").unwrap(), None);
    }

    #[test]
    fn file_store_corrupt_json_loads_empty() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("corrupt.json");
        fs::write(&file, "{not json").unwrap();

        let store = FileStore::open(&file).unwrap();
        assert_eq!(store.get("timer.state").unwrap(), None);
    }

    #[test]
    fn file_store_unsupported_version_loads_empty() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("v9.json");
        fs::write(&file, r#"{"version":9,"values":{"timer.streak":4}}"#).unwrap();

        let store = FileStore::open(&file).unwrap();
        assert_eq!(store.get("timer.streak").unwrap(), None);
    }
}
