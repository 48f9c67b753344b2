//! Snapshot persistence for the preference-like subset of each store.
//!
//! Each store writes one key holding `{"state": <snapshot>, "version": N}`.
//! A snapshot that fails to parse, or carries another version, is discarded
//! with a warning and the store keeps its defaults.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::SNAPSHOT_VERSION;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// String key-value storage shared by all stores.
pub trait SnapshotStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove_item(&self, key: &str) -> Result<(), PersistError>;
}

/// One `<key>.json` file per key inside a directory.
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SnapshotStorage for JsonFileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write-to-temp-then-rename so a crash never leaves a torn file.
    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, value)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl SnapshotStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// A store with a persisted subset.
pub trait Persistable {
    const STORAGE_KEY: &'static str;
    type Snapshot: Serialize + DeserializeOwned;

    fn to_persistable(&self) -> Self::Snapshot;
    fn from_persistable(&self, snapshot: Self::Snapshot);
}

#[derive(Serialize, Deserialize)]
struct Envelope<S> {
    state: S,
    version: u32,
}

pub fn save_snapshot<P: Persistable>(
    store: &P,
    storage: &dyn SnapshotStorage,
) -> Result<(), PersistError> {
    let envelope = Envelope {
        state: store.to_persistable(),
        version: SNAPSHOT_VERSION,
    };
    let json = serde_json::to_string(&envelope)?;
    storage.set_item(P::STORAGE_KEY, &json)?;
    debug!(key = P::STORAGE_KEY, "snapshot saved");
    Ok(())
}

/// Load the stored snapshot into `store`. Returns `Ok(false)` when nothing
/// usable was stored.
pub fn restore_snapshot<P: Persistable>(
    store: &P,
    storage: &dyn SnapshotStorage,
) -> Result<bool, PersistError> {
    let Some(raw) = storage.get_item(P::STORAGE_KEY)? else {
        return Ok(false);
    };

    let envelope: Envelope<Value> = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(key = P::STORAGE_KEY, "discarding unreadable snapshot: {}", e);
            return Ok(false);
        }
    };

    if envelope.version != SNAPSHOT_VERSION {
        warn!(
            key = P::STORAGE_KEY,
            "snapshot version mismatch (stored={} current={}), discarding",
            envelope.version,
            SNAPSHOT_VERSION
        );
        return Ok(false);
    }

    match serde_json::from_value::<P::Snapshot>(envelope.state) {
        Ok(snapshot) => {
            store.from_persistable(snapshot);
            debug!(key = P::STORAGE_KEY, "snapshot restored");
            Ok(true)
        }
        Err(e) => {
            warn!(key = P::STORAGE_KEY, "discarding malformed snapshot: {}", e);
            Ok(false)
        }
    }
}
