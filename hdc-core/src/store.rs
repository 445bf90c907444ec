//! JSON-file persistence for config entries.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::ConfigEntry;

#[derive(thiserror::Error, Debug)]
/// Errors raised while reading or writing the entry store.
pub enum StoreError {
    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Stored JSON is malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntries {
    version: u32,
    entries: Vec<ConfigEntry>,
}

const STORE_VERSION: u32 = 1;

/// Config entries backed by a JSON file.
pub struct ConfigStore {
    path: PathBuf,
    entries: Vec<ConfigEntry>,
}

impl ConfigStore {
    /// Load entries from `path`; a missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => {
                let stored = serde_json::from_str::<StoredEntries>(&raw)?;
                if stored.version > STORE_VERSION {
                    warn!(
                        path = %path.display(),
                        version = stored.version,
                        "Entry store written by a newer version"
                    );
                }
                stored.entries
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), count = entries.len(), "Loaded config entries");
        Ok(Self { path, entries })
    }

    /// File backing the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn entry(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|entry| entry.entry_id == entry_id)
    }

    /// Append an entry and persist.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn add(&mut self, entry: ConfigEntry) -> Result<(), StoreError> {
        self.entries.push(entry);
        self.save()
    }

    /// Remove an entry and persist. Returns the removed entry, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn remove(&mut self, entry_id: &str) -> Result<Option<ConfigEntry>, StoreError> {
        let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.entry_id == entry_id)
        else {
            return Ok(None);
        };
        let removed = self.entries.remove(position);
        self.save()?;
        Ok(Some(removed))
    }

    fn save(&self) -> Result<(), StoreError> {
        let stored = StoredEntries {
            version: STORE_VERSION,
            entries: self.entries.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;
    use crate::model::{EntryData, Uprn, entry_title};

    fn scratch(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("hdc-store-{}-{name}.json", process::id()));
        let _removed = fs::remove_file(&path);
        path
    }

    fn entry(uprn: u64) -> ConfigEntry {
        ConfigEntry::new(entry_title(Uprn(uprn)), EntryData { uprn: Uprn(uprn) })
    }

    #[test]
    fn missing_file_is_empty() {
        let store = ConfigStore::load(scratch("missing")).expect("loads");

        assert!(store.entries().is_empty(), "no entries");
    }

    #[test]
    fn entries_survive_reload() {
        let path = scratch("reload");
        let mut store = ConfigStore::load(&path).expect("loads");
        store.add(entry(1)).expect("adds");
        store.add(entry(2)).expect("adds");

        let removed = store.remove("hdc_1").expect("removes");
        assert_eq!(removed.map(|entry| entry.data.uprn), Some(Uprn(1)), "removed");

        let reloaded = ConfigStore::load(&path).expect("reloads");
        assert_eq!(reloaded.entries(), &[entry(2)], "persisted");

        let raw = fs::read_to_string(&path).expect("readable");
        assert!(raw.contains("\"uprn\": 2"), "entry data stored as integer");
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = scratch("corrupt");
        fs::write(&path, "{not json").expect("writes");

        assert!(
            matches!(ConfigStore::load(&path), Err(StoreError::Json(_))),
            "json error"
        );
        fs::remove_file(path).expect("cleanup");
    }
}
