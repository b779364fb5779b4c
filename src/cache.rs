//! Key-value caching
//!
//! Fund metadata URIs are cached by fund address so dashboards don't have to
//! re-resolve them on every refresh. The backing store is injected: an
//! in-memory map for tests, or a JSON file that survives restarts.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Errors that can occur in a key-value store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Minimal string key-value capability
///
/// No transactional guarantees; concurrent writers may overwrite each other.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CacheResult<()>;
}

fn lock_error<E: std::fmt::Display>(e: E) -> CacheError {
    CacheError::Lock(e.to_string())
}

/// Store backed by a process-local map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.read().map_err(lock_error)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.entries
            .write()
            .map_err(lock_error)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a JSON object on disk
///
/// The whole map is rewritten on every `set` (write to a temp file, then
/// rename).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file is missing or
    /// unreadable
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, Value>>(&content) {
                Ok(map) => map
                    .into_iter()
                    .filter_map(|(k, v)| match v {
                        Value::String(s) => Some((k, s)),
                        _ => None,
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Cache file corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> CacheResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.read().map_err(lock_error)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }
}

const METADATA_KEY_PREFIX: &str = "fund-metadata:";

/// Metadata URI cache keyed by fund address
///
/// Reads hit a process-local map first and fall back to the injected store,
/// which mirrors every write.
pub struct MetadataCache<S: KeyValueStore> {
    store: S,
    memory: RwLock<HashMap<String, String>>,
}

impl<S: KeyValueStore> MetadataCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            memory: RwLock::new(HashMap::new()),
        }
    }

    fn key(address: &str) -> String {
        format!("{}{}", METADATA_KEY_PREFIX, address.trim().to_lowercase())
    }

    /// Cached metadata URI for `address`
    pub fn uri(&self, address: &str) -> CacheResult<Option<String>> {
        let key = Self::key(address);

        if let Some(uri) = self.memory.read().map_err(lock_error)?.get(&key) {
            return Ok(Some(uri.clone()));
        }

        let stored = self.store.get(&key)?;
        if let Some(uri) = &stored {
            self.memory
                .write()
                .map_err(lock_error)?
                .insert(key, uri.clone());
        }

        Ok(stored)
    }

    /// Record the metadata URI for `address`
    pub fn remember(&self, address: &str, uri: &str) -> CacheResult<()> {
        let key = Self::key(address);
        self.store.set(&key, uri)?;
        self.memory
            .write()
            .map_err(lock_error)?
            .insert(key, uri.to_string());
        Ok(())
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }
}
