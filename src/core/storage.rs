/// Key-value persistence for the save slot and unlocked endings.

use rustc_hash::FxHashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default key names, compatible with saves written by earlier builds.
pub mod keys {
    pub const SAVE_SLOT: &str = "novelSave";
    pub const ENDINGS: &str = "novelEndings";
}

/// A string store with `get`/`set` semantics, like browser local storage.
pub trait KeyValueStore {
    /// Missing keys and unreadable values both read as `None`.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store; contents die with the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: FxHashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside a directory: `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read store entry");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Read the unlocked-endings list. Corrupt data reads as empty.
pub fn read_endings(store: &dyn KeyValueStore, key: &str) -> Vec<String> {
    match stored_endings(store, key) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "unlocked endings list is corrupt; treating as empty");
            Vec::new()
        }
    }
}

fn stored_endings(store: &dyn KeyValueStore, key: &str) -> Result<Vec<String>, serde_json::Error> {
    match store.get(key) {
        Some(raw) => serde_json::from_str(&raw),
        None => Ok(Vec::new()),
    }
}

/// Add an ending id to the unlocked set. The set only ever grows.
/// Returns whether the id was new.
///
/// A stored list that does not parse is left untouched and reported as an
/// error; rewriting it would drop every ending it held.
pub fn unlock_ending(
    store: &mut dyn KeyValueStore,
    key: &str,
    id: &str,
) -> Result<bool, StorageError> {
    let mut ids = stored_endings(store, key)?;
    if ids.iter().any(|e| e == id) {
        return Ok(false);
    }
    ids.push(id.to_string());
    store.set(key, &serde_json::to_string(&ids)?)?;
    Ok(true)
}
