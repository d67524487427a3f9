//! Persistent fingerprint cache.
//!
//! This module provides the persistent storage that lets repeated runs skip
//! files whose content is provably unchanged:
//!
//! * [`store`]: The in-memory map of relative path to fingerprint, its JSON
//!   persistence, and the concurrent access discipline.
//! * [`key`]: Deterministic derivation of the cache file location from a
//!   (source, destination) pair.
//! * [`stale`]: Age-based eviction of entries that outlived their retention
//!   threshold.
//!
//! # Cache Invalidation
//!
//! Entries record a file's size, 64-bit content hash, and the wall-clock
//! time the entry was written. A file is trusted as up to date only when
//! its current size and a freshly computed content hash both match the
//! entry; the recorded time only feeds age-based eviction.

pub mod key;
pub mod stale;
pub mod store;

pub use key::{derive_cache_key, CACHE_DIR};
pub use stale::{evict_stale, EvictionReport};
pub use store::{CacheError, FingerprintCache};

use serde::{Deserialize, Serialize};

/// Last known state of one source file.
///
/// Present-and-matching semantics: if an entry exists and its `size` and
/// `hash` match the current source file, the destination is assumed to
/// already equal the source (re-verified only in validate mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File size in bytes.
    pub size: u64,
    /// xxh64 fingerprint of the file contents.
    pub hash: u64,
    /// Unix timestamp (seconds) of when the entry was recorded.
    /// Zero means "never expire" for age-based eviction.
    pub mod_time: i64,
}

impl CacheEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(size: u64, hash: u64, mod_time: i64) -> Self {
        Self {
            size,
            hash,
            mod_time,
        }
    }
}
