//! In-memory fingerprint map with whole-file JSON persistence.
//!
//! The store is shared by every copy worker for the lifetime of one run.
//! Lookups take the read lock; mutation takes the write lock. `save` also
//! serializes under the read lock, so a snapshot can never observe a
//! half-applied mutation, while concurrent lookups proceed freely. Writes
//! to the backing file are serialized behind their own lock so concurrent
//! checkpoints from multiple workers never race on the temp file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde_json::Value;

use super::CacheEntry;

/// Errors produced by cache persistence.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Failed to serialize the cache map.
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Failed to write the cache file.
    #[error("Failed to write cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persistent mapping from relative source path to [`CacheEntry`].
///
/// One instance exists per (source, destination) pair per run. Loading a
/// missing or malformed store is not an error: the run degrades to an
/// empty cache and re-copies everything.
#[derive(Debug)]
pub struct FingerprintCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    save_lock: Mutex<()>,
    path: PathBuf,
}

impl FingerprintCache {
    /// Load the cache backing store at `path`, or start empty.
    ///
    /// A missing file is expected on first runs. Malformed content is read
    /// best-effort: entries that fail to parse are dropped with a warning,
    /// and a file that is not a JSON object at all yields an empty cache.
    #[must_use]
    pub fn load(path: PathBuf) -> Self {
        let entries = match fs::read(&path) {
            Ok(bytes) => parse_entries(&bytes, &path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No cache file found: {}", path.display());
                HashMap::new()
            }
            Err(e) => {
                log::warn!("Error opening cache file {}: {}", path.display(), e);
                HashMap::new()
            }
        };
        Self {
            entries: RwLock::new(entries),
            save_lock: Mutex::new(()),
            path,
        }
    }

    /// Path of the backing store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the whole map and write it atomically to the backing store.
    ///
    /// Each call is a full snapshot. The map is serialized under the read
    /// lock; the bytes are written to a sibling temp file and renamed into
    /// place so a new run never sees a partially written store. Saves
    /// themselves are serialized behind a dedicated lock: every worker
    /// checkpoints through this method and the temp file is shared, so
    /// overlapping writers would otherwise tear it mid-rename.
    pub fn save(&self) -> Result<(), CacheError> {
        let _saving = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        let data = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_vec(&*entries)?
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Look up the entry for a relative path.
    #[must_use]
    pub fn get(&self, rel_path: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(rel_path)
            .copied()
    }

    /// Insert or overwrite the entry for a relative path.
    pub fn put(&self, rel_path: &str, size: u64, hash: u64, mod_time: i64) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(rel_path.to_string(), CacheEntry::new(size, hash, mod_time));
    }

    /// Remove the entry for a relative path, if present.
    pub fn remove(&self, rel_path: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(rel_path);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// All relative paths currently cached.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry whose relative path no longer resolves to an
    /// existing file under `source_root`. Returns how many were removed.
    pub fn prune_missing(&self, source_root: &Path) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|rel, _| source_root.join(rel).exists());
        before - entries.len()
    }

    /// Run `f` over a snapshot of all (path, entry) pairs.
    ///
    /// Used by the staleness pass, which needs to inspect entries without
    /// holding the lock across its own mutations.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

/// Parse the store bytes entry by entry, dropping anything malformed.
fn parse_entries(bytes: &[u8], path: &Path) -> HashMap<String, CacheEntry> {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            log::warn!(
                "Cache file {} is not valid JSON, starting empty: {}",
                path.display(),
                e
            );
            return HashMap::new();
        }
    };
    let Value::Object(map) = value else {
        log::warn!(
            "Cache file {} does not contain an object, starting empty",
            path.display()
        );
        return HashMap::new();
    };
    let mut entries = HashMap::with_capacity(map.len());
    for (rel, raw) in map {
        match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) => {
                entries.insert(rel, entry);
            }
            Err(e) => {
                log::warn!("Dropping malformed cache entry for '{}': {}", rel, e);
            }
        }
    }
    entries
}
