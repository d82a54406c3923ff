//! Key-value storage backends for the rating cache
//!
//! The rating cache only needs asynchronous `get`/`set` of JSON values under a
//! string key. `MemoryStore` keeps values in process; `FileStore` persists each
//! key as a JSON file in an XDG-compliant cache directory.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use directories::ProjectDirs;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;

/// Errors that can occur when reading or writing a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored value could not be encoded or decoded
    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Asynchronous key-value capability backing the rating cache
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `None` if nothing is stored
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value stored under `key`
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// In-process store, mainly for tests and short-lived embedders
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with one value
    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    /// Synchronously replaces a value (handy for seeding state)
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.lock().insert(key.into(), value);
    }

    /// Synchronously reads a value
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshot(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }
}

/// Stores each key as a JSON file on disk
///
/// Files live in an XDG-compliant cache directory (`~/.cache/vinorate/` on Linux)
/// unless a directory is given explicitly.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where store files are kept
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the platform cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "vinorate")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the store files
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Returns the path of the file holding `key`
    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let content = match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string(&value)?;
        fs::write(self.path_for(key), json).await?;
        Ok(())
    }
}
