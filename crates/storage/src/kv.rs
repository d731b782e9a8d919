//! Embedded key-value store for small settings
//!
//! Backed by sled. Each consumer works inside its own [`KvScope`], which maps
//! to a separate sled tree, so keys never collide across consumers. Values
//! are JSON so the files stay inspectable.

use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Key-value store error types
#[derive(Debug, Error)]
pub enum KvError {
    /// sled failed to open, read or write
    #[error("Key-value store error: {0}")]
    Database(#[from] sled::Error),

    /// A stored value did not match the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for key-value operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Where and how the store keeps its files
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Directory sled writes into
    pub path: PathBuf,
    /// Page cache size in bytes
    pub cache_capacity: u64,
    /// Compress values on disk
    pub use_compression: bool,
    /// Background flush period; `None` flushes only on [`KvStore::flush`]
    pub flush_every_ms: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("preferences"),
            cache_capacity: 256 * 1024,
            use_compression: true,
            flush_every_ms: Some(1_000),
        }
    }
}

impl KvConfig {
    /// Configuration rooted at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set the page cache size
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Toggle on-disk compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set the background flush period
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    fn sled(&self) -> sled::Config {
        sled::Config::new()
            .path(&self.path)
            .cache_capacity(self.cache_capacity)
            .use_compression(self.use_compression)
            .flush_every_ms(self.flush_every_ms)
    }
}

/// Handle to an open store; clones share the same database
#[derive(Clone)]
pub struct KvStore {
    db: sled::Db,
}

impl KvStore {
    /// Open (or create) the store described by `config`
    pub fn open(config: &KvConfig) -> Result<Self> {
        let db = config.sled().open()?;
        if db.was_recovered() {
            tracing::debug!("Reopened key-value store at {}", config.path.display());
        }
        Ok(Self { db })
    }

    /// A store that is deleted when the last handle drops
    pub fn temporary() -> Result<Self> {
        Ok(Self { db: sled::Config::new().temporary(true).open()? })
    }

    /// Open a named scope
    pub fn scope(&self, name: &str) -> Result<KvScope> {
        Ok(KvScope { tree: self.db.open_tree(name)? })
    }

    /// Write everything buffered to disk, returning the bytes flushed
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

/// A namespace of typed entries inside a [`KvStore`]
#[derive(Clone)]
pub struct KvScope {
    tree: sled::Tree,
}

impl KvScope {
    /// Scope name
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.tree.name()).into_owned()
    }

    /// Decode the value under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.tree
            .get(key)?
            .map(|raw| serde_json::from_slice(&raw))
            .transpose()
            .map_err(KvError::from)
    }

    /// Decode the value under `key`, falling back to `default`
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Encode and store `value` under `key`
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.tree.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.tree.remove(key)?.is_some())
    }

    /// Whether `key` holds a value
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.tree.contains_key(key)?)
    }

    /// Keys in byte order
    pub fn keys(&self) -> Result<Vec<String>> {
        self.tree
            .iter()
            .keys()
            .map(|key| -> Result<String> { Ok(String::from_utf8_lossy(&key?).into_owned()) })
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the scope holds nothing
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
