use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::KeyValueStore;

/// Durable store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file; the stored maps hold a handful of
/// entries so this stays cheap.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store file: {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse store file: {}", self.path.display()))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write store file: {}", self.path.display()))?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                // A corrupt file is replaced rather than blocking every write
                warn!(error = %e, "Discarding unreadable store file");
                BTreeMap::new()
            }
        };
        f(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.read_map() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                warn!(error = %e, key, "Failed to load store file");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        debug!(key, path = %self.path.display(), "Writing store entry");
        if let Err(e) = self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        }) {
            warn!(error = %e, key, "Failed to save store entry");
        }
    }

    fn remove(&self, key: &str) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = self.update(|map| {
            map.remove(key);
        }) {
            warn!(error = %e, key, "Failed to remove store entry");
        }
    }
}
