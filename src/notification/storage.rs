//! Durable storage for the notification store state.
//!
//! The state is a single JSON document kept under a fixed namespace key.
//! Two backends implement [`StateStorage`]:
//!
//! - `FileStorage`: `<dir>/<key>.json`, replaced atomically on every save
//! - `MemoryStorage`: keeps the serialized document in memory (tests, ephemeral runs)
//!
//! Use [`create_storage`] to pick one from configuration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StorageConfig;

use super::preferences::NotificationPreferences;
use super::types::Notification;

/// Current on-disk document version
pub const STATE_VERSION: u32 = 1;

/// Errors that can occur while loading or saving store state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted part of the store state.
///
/// Unread counts and groups are derived from `notifications` and are
/// never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub preferences: NotificationPreferences,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            notifications: Vec::new(),
            preferences: NotificationPreferences::default(),
        }
    }
}

/// Storage backend for the store state
pub trait StateStorage: Send + Sync {
    /// Load the last saved state; `Ok(None)` when nothing was saved yet
    fn load(&self) -> Result<Option<PersistedState>, StorageError>;

    /// Replace the saved state
    fn save(&self, state: &PersistedState) -> Result<(), StorageError>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// JSON file backend
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Store state at `<dir>/<key>.json`
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let state: PersistedState = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state)?;

        // Write to a sibling temp file, then rename over the target
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
            file.write_all(&bytes).map_err(|e| self.io_error(e))?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

/// In-memory backend holding the serialized document
#[derive(Default)]
pub struct MemoryStorage {
    document: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-serialized document
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    /// Raw serialized document, if any
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedState>, StorageError> {
        match self.document() {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        let doc = serde_json::to_string(state)?;
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = Some(doc);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Create a storage backend based on configuration.
///
/// - `"memory"`: Returns a `MemoryStorage`
/// - `"file"` (default): Returns a `FileStorage` at `<dir>/<key>.json`
pub fn create_storage(settings: &StorageConfig) -> Arc<dyn StateStorage> {
    match settings.backend.as_str() {
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory state storage");
            Arc::new(MemoryStorage::new())
        }
        other => {
            if other != "file" {
                tracing::warn!(
                    backend = %other,
                    "Unknown storage backend requested, falling back to file"
                );
            }
            let storage = FileStorage::new(&settings.dir, &settings.key);
            tracing::info!(
                backend = "file",
                path = %storage.path().display(),
                "Creating file state storage"
            );
            Arc::new(storage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::types::{Category, NewNotification, Priority};

    fn sample_state() -> PersistedState {
        let input = NewNotification::builder(Category::Finance, "Invoice overdue")
            .message("Invoice #88 is 10 days late")
            .priority(Priority::High)
            .build();

        let mut preferences = NotificationPreferences::default();
        preferences.do_not_disturb = true;

        PersistedState {
            version: STATE_VERSION,
            notifications: vec![Notification::from_new(input)],
            preferences,
        }
    }

    #[test]
    fn test_file_storage_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "notification-storage");

        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"), "notification-storage");
        let state = sample_state();

        storage.save(&state).unwrap();
        assert!(storage.path().ends_with("nested/notification-storage.json"));

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_file_storage_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "state");
        fs::write(storage.path(), b"{not json").unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.load().unwrap().is_none());

        let state = sample_state();
        storage.save(&state).unwrap();
        assert_eq!(storage.load().unwrap(), Some(state));
    }

    #[test]
    fn test_create_storage_factory() {
        let config = StorageConfig {
            backend: "memory".to_string(),
            ..Default::default()
        };
        assert_eq!(create_storage(&config).backend_name(), "memory");

        let config = StorageConfig::default();
        assert_eq!(create_storage(&config).backend_name(), "file");
    }
}
