//! Age-based eviction of cache rows.
//!
//! A row is stale when its recorded time is older than the retention
//! threshold. Rows with a zero recorded time never expire. When nothing
//! fresh survives eviction, the backing store file is deleted outright
//! rather than left behind as an empty file.

use std::fs;
use std::io;

use super::FingerprintCache;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionReport {
    /// Number of rows removed for exceeding the age threshold.
    pub evicted: usize,
    /// Whether the backing store file was deleted because no fresh row
    /// survived.
    pub store_deleted: bool,
}

/// Remove rows older than `max_age_days`, then delete the backing store
/// file if the cache was non-empty and no surviving row is fresh.
///
/// Idempotent: a second invocation with the same threshold removes
/// nothing further.
pub fn evict_stale(
    cache: &FingerprintCache,
    max_age_days: u64,
    now: i64,
) -> io::Result<EvictionReport> {
    // Saturate so an absurd threshold disables eviction instead of
    // overflowing.
    let max_age_secs = i64::try_from(max_age_days)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECONDS_PER_DAY);
    let was_populated = !cache.is_empty();

    let mut evicted = 0;
    for (rel, entry) in cache.snapshot() {
        if entry.mod_time > 0 && now - entry.mod_time > max_age_secs {
            log::debug!("Evicting stale cache entry: {rel}");
            cache.remove(&rel);
            evicted += 1;
        }
    }

    // Rows with mod_time == 0 never expire, but they also do not count as
    // fresh: a store holding only such rows is discarded here.
    let any_fresh = cache
        .snapshot()
        .iter()
        .any(|(_, e)| e.mod_time > 0 && now - e.mod_time <= max_age_secs);

    let mut store_deleted = false;
    if was_populated && !any_fresh {
        match fs::remove_file(cache.path()) {
            Ok(()) => store_deleted = true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    Ok(EvictionReport {
        evicted,
        store_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn evicts_exactly_the_entries_past_the_threshold() {
        let dir = tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let now = now();
        let age_days = 30u64;
        cache.put("old.txt", 1, 1, now - (age_days as i64 + 1) * SECONDS_PER_DAY);
        cache.put("new.txt", 1, 1, now - (age_days as i64 - 1) * SECONDS_PER_DAY);
        cache.save().unwrap();

        let report = evict_stale(&cache, age_days, now).unwrap();
        assert_eq!(report.evicted, 1);
        assert!(!report.store_deleted);
        assert!(cache.get("old.txt").is_none());
        assert!(cache.get("new.txt").is_some());
    }

    #[test]
    fn zero_mod_time_never_expires() {
        let dir = tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let now = now();
        cache.put("pinned.txt", 1, 1, 0);
        cache.put("fresh.txt", 1, 1, now);
        cache.save().unwrap();

        let report = evict_stale(&cache, 1, now).unwrap();
        assert_eq!(report.evicted, 0);
        assert!(cache.get("pinned.txt").is_some());
    }

    #[test]
    fn all_stale_store_is_deleted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FingerprintCache::load(path.clone());
        let now = now();
        cache.put("old.txt", 1, 1, now - 100 * SECONDS_PER_DAY);
        cache.save().unwrap();
        assert!(path.exists());

        let report = evict_stale(&cache, 30, now).unwrap();
        assert_eq!(report.evicted, 1);
        assert!(report.store_deleted);
        assert!(!path.exists());
    }

    #[test]
    fn empty_cache_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FingerprintCache::load(path.clone());
        let report = evict_stale(&cache, 30, now()).unwrap();
        assert_eq!(report.evicted, 0);
        assert!(!report.store_deleted);
    }

    #[test]
    fn huge_age_threshold_evicts_nothing() {
        let dir = tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        cache.put("ancient.txt", 1, 1, 1);

        let report = evict_stale(&cache, u64::MAX, now()).unwrap();
        assert_eq!(report.evicted, 0);
        assert!(!report.store_deleted);
        assert!(cache.get("ancient.txt").is_some());
    }

    #[test]
    fn eviction_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let now = now();
        cache.put("old.txt", 1, 1, now - 100 * SECONDS_PER_DAY);
        cache.put("new.txt", 1, 1, now);
        cache.save().unwrap();

        let first = evict_stale(&cache, 30, now).unwrap();
        let second = evict_stale(&cache, 30, now).unwrap();
        assert_eq!(first.evicted, 1);
        assert_eq!(second.evicted, 0);
    }
}
