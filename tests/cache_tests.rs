//! Integration tests for the fingerprint cache store, key derivation,
//! and staleness eviction.

use std::fs;
use std::path::Path;

use cachecopy::cache::{derive_cache_key, evict_stale, FingerprintCache, CACHE_DIR};
use tempfile::tempdir;

const DAY: i64 = 24 * 60 * 60;

#[test]
fn store_format_round_trips_field_names_and_u64_hashes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache = FingerprintCache::load(path.clone());
    cache.put("dir/file.txt", 1234, u64::MAX - 7, 1_700_000_000);
    cache.save().unwrap();

    // Field names are the stable store format.
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"size\""));
    assert!(raw.contains("\"hash\""));
    assert!(raw.contains("\"mod_time\""));

    // Numeric encoding is lossless, including near-max u64 hashes.
    let reloaded = FingerprintCache::load(path);
    let entry = reloaded.get("dir/file.txt").unwrap();
    assert_eq!(entry.size, 1234);
    assert_eq!(entry.hash, u64::MAX - 7);
    assert_eq!(entry.mod_time, 1_700_000_000);
}

#[test]
fn save_is_repeatable_and_last_snapshot_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache = FingerprintCache::load(path.clone());
    cache.put("a", 1, 1, 1);
    cache.save().unwrap();
    cache.put("b", 2, 2, 2);
    cache.save().unwrap();
    cache.remove("a");
    cache.save().unwrap();

    let reloaded = FingerprintCache::load(path);
    assert!(reloaded.get("a").is_none());
    assert!(reloaded.get("b").is_some());
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn cache_key_is_stable_and_pair_specific() {
    let a1 = derive_cache_key(Path::new("/srv/data"), Path::new("/mnt/backup"));
    let a2 = derive_cache_key(Path::new("/srv/data/"), Path::new("/mnt/backup/"));
    let b = derive_cache_key(Path::new("/srv/data"), Path::new("/mnt/other"));

    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert!(a1.starts_with(CACHE_DIR));
    assert_ne!(a1.file_name(), b.file_name());
}

#[test]
fn eviction_boundary_is_exact() {
    let dir = tempdir().unwrap();
    let cache = FingerprintCache::load(dir.path().join("cache.json"));
    let now = chrono::Utc::now().timestamp();
    let age = 30u64;

    cache.put("too-old.txt", 1, 1, now - (age as i64 + 1) * DAY);
    cache.put("still-fresh.txt", 1, 1, now - (age as i64 - 1) * DAY);
    cache.save().unwrap();

    let report = evict_stale(&cache, age, now).unwrap();
    assert_eq!(report.evicted, 1);
    assert!(!report.store_deleted);
    assert!(cache.get("too-old.txt").is_none());
    assert!(cache.get("still-fresh.txt").is_some());
}

#[test]
fn prune_missing_then_save_drops_rows_for_deleted_sources() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("kept.txt"), b"k").unwrap();
    fs::write(src.join("doomed.txt"), b"d").unwrap();

    let path = dir.path().join("cache.json");
    let cache = FingerprintCache::load(path.clone());
    cache.put("kept.txt", 1, 1, 1);
    cache.put("doomed.txt", 1, 1, 1);
    cache.save().unwrap();

    fs::remove_file(src.join("doomed.txt")).unwrap();
    assert_eq!(cache.prune_missing(&src), 1);
    cache.save().unwrap();

    let reloaded = FingerprintCache::load(path);
    assert!(reloaded.get("kept.txt").is_some());
    assert!(reloaded.get("doomed.txt").is_none());
}
