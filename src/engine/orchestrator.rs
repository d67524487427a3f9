//! Bounded worker pool that drains the file list.
//!
//! The queue is seeded with every relative path up front and then closed;
//! workers pull until it is empty. Each worker owns its transfer buffer.
//! The fingerprint cache is the only shared mutable resource and is
//! checkpointed aggressively: after every successful copy-and-update, by
//! each worker as it exits, and once more by the caller. Redundant
//! full-snapshot writes are the accepted cost of crash resilience.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::FingerprintCache;
use crate::transfer::{compute_fingerprint, transfer};

use super::decision::{decide, Verdict};
use super::{CopyOptions, EngineError, EventSink};

/// Minimum interval between progress callbacks from a single worker.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Aggregate results of one engine run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyStats {
    /// Files transferred.
    pub files_copied: u64,
    /// Files skipped as up to date.
    pub files_skipped: u64,
    /// Bytes written by transfers (skipped files excluded).
    pub bytes_copied: u64,
    /// Source files that could not be stat'ed and were passed over.
    pub files_unreadable: u64,
}

/// Shared byte accumulator guarded by one lock, so the read-modify-write
/// and the at-total check are linearizable.
struct Progress {
    copied: Mutex<u64>,
    total: u64,
}

impl Progress {
    /// Add `bytes` and report through `sink` if due. The final update
    /// (accumulator reaching the grand total) is never throttled.
    fn add(&self, bytes: u64, last_report: &mut Instant, sink: &dyn EventSink) {
        let mut copied = self.copied.lock().unwrap_or_else(|e| e.into_inner());
        *copied += bytes;
        let now = Instant::now();
        if now.duration_since(*last_report) >= PROGRESS_INTERVAL || *copied == self.total {
            *last_report = now;
            sink.progress(*copied, self.total);
        }
    }
}

/// Drain `file_list` through a fixed pool of copy workers.
///
/// Returns the aggregate stats, or the first fatal error. A fatal error
/// saves the cache, reports through the fatal sink, and raises the shared
/// shutdown flag so other workers stop picking up new items; in-flight
/// transfers are not interrupted.
pub fn run(
    file_list: &[String],
    total_bytes: u64,
    cache: &FingerprintCache,
    opts: &CopyOptions,
    sink: &dyn EventSink,
) -> Result<CopyStats, EngineError> {
    let workers = opts.workers.max(1);
    let (tx, rx) = crossbeam_channel::unbounded::<&str>();
    for rel in file_list {
        // Queue is pre-seeded in full, then closed by dropping the sender.
        let _ = tx.send(rel.as_str());
    }
    drop(tx);

    let progress = Progress {
        copied: Mutex::new(0),
        total: total_bytes,
    };
    let fatal: Mutex<Option<String>> = Mutex::new(None);
    let copied = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);
    let bytes = AtomicU64::new(0);
    let unreadable = AtomicU64::new(0);

    thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let progress = &progress;
            let fatal = &fatal;
            let copied = &copied;
            let skipped = &skipped;
            let bytes = &bytes;
            let unreadable = &unreadable;
            scope.spawn(move || {
                let mut buf = vec![0u8; opts.buffer_size.max(1)];
                let mut last_report = Instant::now() - PROGRESS_INTERVAL;
                for rel in rx.iter() {
                    if opts.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let src_path = opts.source_root.join(rel);
                    let dst_path = opts.dest_root.join(rel);

                    // Soft failure: log and move on to the next item.
                    let src_size = match fs::metadata(&src_path) {
                        Ok(meta) => meta.len(),
                        Err(e) => {
                            sink.log(&format!(
                                "[ERROR] Failed to stat {}: {}",
                                src_path.display(),
                                e
                            ));
                            unreadable.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };

                    let verdict = decide(cache, opts, rel, src_size, sink);
                    log_verdict(&verdict, rel, src_size, opts.verbosity, sink);

                    if verdict.is_copy() {
                        if let Err(line) =
                            copy_one(rel, &src_path, &dst_path, &mut buf, cache, opts, sink)
                        {
                            // First fatal wins; the run is over either way.
                            report_fatal(line, cache, opts, fatal, sink);
                            return;
                        }
                        copied.fetch_add(1, Ordering::Relaxed);
                        bytes.fetch_add(src_size, Ordering::Relaxed);
                    } else {
                        skipped.fetch_add(1, Ordering::Relaxed);
                    }

                    progress.add(src_size, &mut last_report, sink);
                }
                // Worker drained its share of the queue; persist what it saw.
                checkpoint(cache, opts);
            });
        }
    });

    checkpoint(cache, opts);

    if let Some(line) = fatal.lock().unwrap_or_else(|e| e.into_inner()).take() {
        return Err(EngineError::Fatal(line));
    }
    if opts.shutdown.load(Ordering::SeqCst) {
        return Err(EngineError::Interrupted);
    }

    Ok(CopyStats {
        files_copied: copied.load(Ordering::Relaxed),
        files_skipped: skipped.load(Ordering::Relaxed),
        bytes_copied: bytes.load(Ordering::Relaxed),
        files_unreadable: unreadable.load(Ordering::Relaxed),
    })
}

/// Transfer one file and update the cache. Returns a formatted fatal line
/// on any structural failure.
fn copy_one(
    rel: &str,
    src_path: &Path,
    dst_path: &Path,
    buf: &mut [u8],
    cache: &FingerprintCache,
    opts: &CopyOptions,
    sink: &dyn EventSink,
) -> Result<(), String> {
    if let Some(parent) = dst_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            format!("Failed to create directory {}: {}", parent.display(), e)
        })?;
    }

    // Stale destination content is removed rather than overwritten in
    // place, so a copy is atomic-or-absent at file granularity.
    if dst_path.exists() {
        fs::remove_file(dst_path).map_err(|e| {
            format!(
                "Failed to remove old destination file {}: {}",
                dst_path.display(),
                e
            )
        })?;
    }

    transfer(src_path, dst_path, buf).map_err(|e| {
        format!(
            "Failed to copy {} to {}: {}",
            src_path.display(),
            dst_path.display(),
            e
        )
    })?;

    if opts.cache_enabled() {
        match compute_fingerprint(src_path) {
            Ok((size, hash)) => {
                cache.put(rel, size, hash, chrono::Utc::now().timestamp());
                if opts.verbosity >= 3 {
                    sink.log(&format!(
                        "[CACHE] Updated entry: {rel} (size={size}, hash={hash})"
                    ));
                }
                checkpoint(cache, opts);
            }
            Err(e) => {
                // Without a trustworthy fingerprint the entry stays absent
                // and the next run re-copies this file.
                log::warn!("Skipping cache update for {rel}: {e}");
            }
        }
    }
    Ok(())
}

fn log_verdict(verdict: &Verdict, rel: &str, size: u64, verbosity: u8, sink: &dyn EventSink) {
    const LARGE_FILE: u64 = 1024 * 1024 * 1024;
    let action = if verdict.is_copy() {
        "Copying"
    } else {
        "Skipping (cached)"
    };
    if verbosity >= 2 {
        sink.log(&format!(
            "{action}: {rel} ({})",
            bytesize::ByteSize::b(size)
        ));
    } else if verbosity == 1 && size > LARGE_FILE {
        sink.log(&format!(
            "{action} large file: {rel} ({})",
            bytesize::ByteSize::b(size)
        ));
    }
}

/// Flush the cache, report through the fatal sink once, and raise the
/// shutdown flag.
fn report_fatal(
    line: String,
    cache: &FingerprintCache,
    opts: &CopyOptions,
    fatal: &Mutex<Option<String>>,
    sink: &dyn EventSink,
) {
    checkpoint(cache, opts);
    let mut slot = fatal.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
        sink.fatal(&line);
        *slot = Some(line);
    }
    opts.shutdown.store(true, Ordering::SeqCst);
}

fn checkpoint(cache: &FingerprintCache, opts: &CopyOptions) {
    if opts.cache_enabled() {
        if let Err(e) = cache.save() {
            log::warn!("Failed to save cache: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct RecordingSink {
        fatals: Mutex<Vec<String>>,
        updates: Mutex<Vec<(u64, u64)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                fatals: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    impl EventSink for RecordingSink {
        fn log(&self, _line: &str) {}
        fn progress(&self, copied: u64, total: u64) {
            self.updates.lock().unwrap().push((copied, total));
        }
        fn fatal(&self, line: &str) {
            self.fatals.lock().unwrap().push(line.to_string());
        }
    }

    fn opts(root: &Path, workers: usize) -> CopyOptions {
        CopyOptions {
            source_root: root.join("src"),
            dest_root: root.join("dst"),
            workers,
            buffer_size: 4096,
            no_cache: false,
            validate: false,
            verbosity: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn copies_everything_then_skips_everything() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        fs::write(dir.path().join("src/a.txt"), b"hello").unwrap();
        fs::write(dir.path().join("src/sub/b.txt"), b"world").unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let files = vec!["a.txt".to_string(), "sub/b.txt".to_string()];
        let o = opts(dir.path(), 2);
        let sink = RecordingSink::new();

        let stats = run(&files, 10, &cache, &o, &sink).unwrap();
        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.files_skipped, 0);
        assert_eq!(stats.bytes_copied, 10);
        assert_eq!(
            fs::read(dir.path().join("dst/sub/b.txt")).unwrap(),
            b"world"
        );

        // Second run over unchanged inputs performs zero transfers.
        let stats = run(&files, 10, &cache, &o, &sink).unwrap();
        assert_eq!(stats.files_copied, 0);
        assert_eq!(stats.files_skipped, 2);
    }

    #[test]
    fn final_progress_update_reaches_the_total() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.txt"), b"12345").unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let o = opts(dir.path(), 1);
        let sink = RecordingSink::new();

        run(&["a.txt".to_string()], 5, &cache, &o, &sink).unwrap();
        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.last(), Some(&(5, 5)));
    }

    #[test]
    fn unreadable_source_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/ok.txt"), b"ok").unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let o = opts(dir.path(), 1);
        let sink = RecordingSink::new();

        let files = vec!["missing.txt".to_string(), "ok.txt".to_string()];
        let stats = run(&files, 2, &cache, &o, &sink).unwrap();
        assert_eq!(stats.files_unreadable, 1);
        assert_eq!(stats.files_copied, 1);
        assert!(sink.fatals.lock().unwrap().is_empty());
    }

    #[test]
    fn shutdown_flag_interrupts_the_run() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.txt"), b"x").unwrap();
        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let o = opts(dir.path(), 1);
        o.shutdown.store(true, Ordering::SeqCst);
        let sink = RecordingSink::new();

        let err = run(&["a.txt".to_string()], 1, &cache, &o, &sink).unwrap_err();
        assert!(matches!(err, EngineError::Interrupted));
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_destination_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.txt"), b"new").unwrap();
        let locked = dir.path().join("dst");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("a.txt"), b"old").unwrap();
        // Read-only directory: the stale destination cannot be removed.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let cache = FingerprintCache::load(dir.path().join("cache.json"));
        let o = opts(dir.path(), 1);
        let sink = RecordingSink::new();
        let result = run(&["a.txt".to_string()], 3, &cache, &o, &sink);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(EngineError::Fatal(_))));
        assert_eq!(sink.fatals.lock().unwrap().len(), 1);
    }
}
