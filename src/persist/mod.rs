//! Session-scoped persistence for the profile and auth identity slices.
//!
//! Only the whitelisted slices in [`PersistedSession`] survive a reload.
//! Connection data has no field here; every new session starts
//! by refetching the connection graph.

use crate::core::{Result, SyncError};
use crate::model::{AuthIdentity, Profile};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Snapshot format version. Snapshots with any other version are discarded.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// Durable key/value store scoped to one client installation
pub trait SessionStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// The whitelisted, serializable part of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub version: u32,
    #[serde(default)]
    pub auth: Option<AuthIdentity>,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub profile_last_fetched: Option<DateTime<Utc>>,
}

impl PersistedSession {
    pub fn new(
        auth: Option<AuthIdentity>,
        profile: Option<Profile>,
        profile_last_fetched: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            version: SESSION_FORMAT_VERSION,
            auth,
            profile,
            profile_last_fetched,
        }
    }
}

// ============================================================================
// Session Persistence
// ============================================================================

/// Reads and writes [`PersistedSession`] snapshots under one key
#[derive(Clone)]
pub struct SessionPersistence {
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl SessionPersistence {
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, session: &PersistedSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.storage.save(&self.key, &json)
    }

    /// Load the stored snapshot.
    ///
    /// A corrupt or foreign-version snapshot is removed and treated as absent.
    pub fn load(&self) -> Result<Option<PersistedSession>> {
        let Some(raw) = self.storage.load(&self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(session) if session.version == SESSION_FORMAT_VERSION => Ok(Some(session)),
            Ok(session) => {
                warn!(
                    "Discarding session '{}' with unsupported version {}",
                    self.key, session.version
                );
                self.storage.remove(&self.key)?;
                Ok(None)
            }
            Err(err) => {
                warn!("Discarding unreadable session '{}': {}", self.key, err);
                self.storage.remove(&self.key)?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(&self.key)
    }
}

// ============================================================================
// Storage backends
// ============================================================================

/// Keeps sessions in process memory
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|e| SyncError::storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| SyncError::storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| SyncError::storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash never leaves a half-written session.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            SyncError::storage(format!(
                "Failed to create session directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| {
            SyncError::storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Some(contents))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| {
            SyncError::storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session() -> PersistedSession {
        PersistedSession::new(
            Some(AuthIdentity::new("u1").with_email("ada@example.org")),
            Some(Profile::new("u1", "Ada Lovelace", Utc::now())),
            Some(Utc::now()),
        )
    }

    #[test]
    fn test_memory_storage_save_load_clear() {
        let persistence = SessionPersistence::new(Arc::new(MemorySessionStorage::new()), "s");
        assert_eq!(persistence.load().unwrap(), None);

        let saved = session();
        persistence.save(&saved).unwrap();
        assert_eq!(persistence.load().unwrap(), Some(saved));

        persistence.clear().unwrap();
        assert_eq!(persistence.load().unwrap(), None);
    }

    #[test]
    fn test_file_storage_survives_new_instance() {
        let dir = tempdir().unwrap();
        let saved = session();

        {
            let storage = FileSessionStorage::new(dir.path()).unwrap();
            SessionPersistence::new(Arc::new(storage), "alumni")
                .save(&saved)
                .unwrap();
        }

        let storage = FileSessionStorage::new(dir.path()).unwrap();
        let persistence = SessionPersistence::new(Arc::new(storage), "alumni");
        assert_eq!(persistence.load().unwrap(), Some(saved));
        assert!(dir.path().join("alumni.json").exists());

        persistence.clear().unwrap();
        persistence.clear().unwrap();
        assert!(!dir.path().join("alumni.json").exists());
    }

    #[test]
    fn test_corrupt_and_foreign_versions_are_discarded() {
        let storage = Arc::new(MemorySessionStorage::new());
        let persistence = SessionPersistence::new(storage.clone(), "s");

        storage.save("s", "{not json").unwrap();
        assert_eq!(persistence.load().unwrap(), None);
        assert_eq!(storage.load("s").unwrap(), None);

        let mut future = session();
        future.version = SESSION_FORMAT_VERSION + 1;
        storage
            .save("s", &serde_json::to_string(&future).unwrap())
            .unwrap();
        assert_eq!(persistence.load().unwrap(), None);
    }

    #[test]
    fn test_snapshot_has_no_connection_slice() {
        let value = serde_json::to_value(session()).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert!(!keys.iter().any(|k| k.contains("connection")));
        assert!(keys.contains(&"profile"));
        assert!(keys.contains(&"auth"));
    }
}
