#![forbid(unsafe_code)]

//! Key-value storage for session state.
//!
//! The session store writes one JSON document per mode under a fixed key.
//! This module supplies the [`StorageBackend`] seam it writes through and
//! two implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SessionStore                             │
//! │   - Serializes ledger + history to a JSON string              │
//! │   - get/set by mode-specific key                              │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                            │
//! │   - MemoryStorage: in-memory (testing, ephemeral kiosks)      │
//! │   - FileStorage: JSON file (requires state-persistence)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic; operations return `Result`.
//! 2. **Atomic writes**: file storage uses write-rename to prevent torn files.
//! 3. **Opaque values**: backends store strings and never inspect them.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, previous file intact |
//! | `StorageError::Serialization` | Backing file is not valid JSON | Returns error |
//! | `StorageError::Corruption` | Lock poisoned | Returns error |
//! | Missing key | First run | `Ok(None)` |

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Backend state is unusable.
    Corruption(String),
    /// Backend is not available.
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_)
            | StorageError::Corruption(_)
            | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A string key-value store.
///
/// Implementations must be `Send + Sync` so a store can be shared with a
/// background flusher if a host wants one.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage backend.
///
/// State is lost when the process exits. Counts writes so tests can observe
/// debouncing.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
    writes: RwLock<u64>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            writes: RwLock::new(0),
        }
    }

    /// Number of successful `set` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.read().map(|w| *w).unwrap_or(0)
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        if let Ok(mut writes) = self.writes.write() {
            *writes += 1;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.len())
            .field("writes", &self.write_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires state-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "state-persistence")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// On-disk layout.
    #[derive(Serialize, Deserialize, Default)]
    struct StoreFile {
        format_version: u32,
        entries: HashMap<String, String>,
    }

    impl StoreFile {
        const FORMAT_VERSION: u32 = 1;
    }

    /// File-backed key-value storage.
    ///
    /// Every key lives in one JSON file. Each `set` rewrites the whole file
    /// through a temporary file and a rename, so a crash mid-write leaves
    /// the previous contents in place.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": {
    ///     "game-bucket-state": "{\"budget\":32000000,...}"
    ///   }
    /// }
    /// ```
    pub struct FileStorage {
        path: PathBuf,
        // Serializes read-modify-write cycles within this process.
        lock: RwLock<()>,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it will be created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
                lock: RwLock::new(()),
            }
        }

        /// Create storage at the default location for the application.
        ///
        /// Uses `$XDG_STATE_HOME/allot/{app_name}/state.json`, falling back
        /// to `~/.local/state` and finally the current directory.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let path = dirs_or_fallback()
                .join("allot")
                .join(app_name)
                .join("state.json");
            Self::new(path)
        }

        /// Path of the backing file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn read_file(&self) -> StorageResult<StoreFile> {
            if !self.path.exists() {
                return Ok(StoreFile {
                    format_version: StoreFile::FORMAT_VERSION,
                    entries: HashMap::new(),
                });
            }
            let reader = BufReader::new(File::open(&self.path)?);
            let file: StoreFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse state file: {e}"))
            })?;
            if file.format_version != StoreFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = file.format_version,
                    expected = StoreFile::FORMAT_VERSION,
                    "state file format version mismatch, ignoring stored state"
                );
                return Ok(StoreFile {
                    format_version: StoreFile::FORMAT_VERSION,
                    entries: HashMap::new(),
                });
            }
            Ok(file)
        }

        fn write_file(&self, file: &StoreFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let mut writer = BufWriter::new(File::create(&tmp_path)?);
                serde_json::to_writer_pretty(&mut writer, file).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize state: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = file.entries.len(),
                "wrote state file"
            );
            Ok(())
        }
    }

    /// Get state directory, falling back to current dir if unavailable.
    fn dirs_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            let _guard = self
                .lock
                .read()
                .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
            Ok(self.read_file()?.entries.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            let _guard = self
                .lock
                .write()
                .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
            // An unreadable file is replaced rather than blocking every write.
            let mut file = self.read_file().unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "replacing unreadable state file");
                StoreFile {
                    format_version: StoreFile::FORMAT_VERSION,
                    entries: HashMap::new(),
                }
            });
            file.format_version = StoreFile::FORMAT_VERSION;
            file.entries.insert(key.to_string(), value.to_string());
            self.write_file(&file)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            let _guard = self
                .lock
                .write()
                .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
            let mut file = self.read_file()?;
            if file.entries.remove(key).is_some() {
                self.write_file(&file)?;
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            if let Some(parent) = self.path.parent() {
                if !parent.exists() {
                    return std::fs::create_dir_all(parent).is_ok();
                }
                let probe = parent.join(".allot_test_write");
                if std::fs::write(&probe, b"test").is_ok() {
                    let _ = std::fs::remove_file(&probe);
                    return true;
                }
            }
            false
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v1").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v1"));

        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(storage.write_count(), 2);

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
        assert!(storage.is_empty());

        // Removing twice is fine.
        storage.remove("k").unwrap();
    }

    #[test]
    fn memory_storage_with_entries() {
        let storage = MemoryStorage::with_entries([("a", "1"), ("b", "2")]);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn keys_are_independent() {
        let storage = MemoryStorage::new();
        storage.set("game-bucket-state", "single").unwrap();
        storage.set("game-bucket-multiuser-state", "multi").unwrap();
        assert_eq!(
            storage.get("game-bucket-state").unwrap().as_deref(),
            Some("single")
        );
        assert_eq!(
            storage.get("game-bucket-multiuser-state").unwrap().as_deref(),
            Some("multi")
        );
    }

    #[test]
    fn boxed_backend_delegates() {
        let boxed: Box<dyn StorageBackend> = Box::new(MemoryStorage::new());
        boxed.set("x", "y").unwrap();
        assert_eq!(boxed.get("x").unwrap().as_deref(), Some("y"));
        assert_eq!(boxed.name(), "MemoryStorage");
        assert!(boxed.is_available());
    }

    #[test]
    fn storage_error_display() {
        let io_err = StorageError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(io_err.to_string().contains("I/O error"));

        let corrupt = StorageError::Corruption("bad data".into());
        assert!(corrupt.to_string().contains("corruption"));

        let unavail = StorageError::Unavailable("no backend".into());
        assert!(unavail.to_string().contains("unavailable"));
    }
}
