//! Per-file copy/skip decision logic.
//!
//! Normal mode trusts a cache entry only after re-hashing the current
//! source content; size and hash must both match and the destination must
//! exist as a regular file. This full re-hash on every run is deliberate:
//! it is the only protection against undetected content changes behind a
//! stale modification time.

use std::fs;
use std::path::Path;

use crate::cache::FingerprintCache;
use crate::transfer::compute_fingerprint;

use super::{CopyMode, CopyOptions, EventSink};

/// Why a file is being (re)copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// Cache disabled for this run.
    CacheBypassed,
    /// No cache entry, or recorded size differs from the current source.
    CacheMiss,
    /// Recorded hash differs from the freshly computed source hash.
    HashChanged,
    /// Source could not be fingerprinted during the up-to-date check.
    Unverifiable,
    /// Destination is missing or not a regular file.
    DestinationMissing,
    /// Validate mode found a size mismatch between source and destination.
    SizeMismatch,
    /// Validate mode found differing content hashes.
    ContentMismatch,
}

/// The verdict for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The destination already equals the source; nothing to do.
    Skip,
    /// The file must be transferred.
    Copy(CopyReason),
}

impl Verdict {
    /// Whether this verdict requires a transfer.
    #[must_use]
    pub fn is_copy(&self) -> bool {
        matches!(self, Verdict::Copy(_))
    }
}

/// Decide whether `rel_path` must be copied.
///
/// In validate mode a successful byte-level match refreshes the cache
/// entry (wall-clock time) when the cache is enabled. Fingerprint failures
/// during the check downgrade to "copy" rather than failing the file; if
/// the copy path itself later fails, the file's processing fails there.
pub fn decide(
    cache: &FingerprintCache,
    opts: &CopyOptions,
    rel_path: &str,
    src_size: u64,
    sink: &dyn EventSink,
) -> Verdict {
    let src_path = opts.source_root.join(rel_path);
    let dst_path = opts.dest_root.join(rel_path);
    match opts.mode() {
        CopyMode::NoCache => Verdict::Copy(CopyReason::CacheBypassed),
        CopyMode::Normal => decide_normal(
            cache,
            rel_path,
            &src_path,
            &dst_path,
            src_size,
            opts.verbosity,
            sink,
        ),
        CopyMode::Validate => decide_validate(
            cache,
            rel_path,
            &src_path,
            &dst_path,
            src_size,
            opts.cache_enabled(),
            opts.verbosity,
            sink,
        ),
    }
}

fn decide_normal(
    cache: &FingerprintCache,
    rel_path: &str,
    src_path: &Path,
    dst_path: &Path,
    src_size: u64,
    verbosity: u8,
    sink: &dyn EventSink,
) -> Verdict {
    let Some(entry) = cache.get(rel_path) else {
        return Verdict::Copy(CopyReason::CacheMiss);
    };
    if entry.size != src_size {
        return Verdict::Copy(CopyReason::CacheMiss);
    }

    let (_, current_hash) = match compute_fingerprint(src_path) {
        Ok(fp) => fp,
        Err(e) => {
            log::warn!(
                "Cannot fingerprint {} during up-to-date check: {}",
                src_path.display(),
                e
            );
            return Verdict::Copy(CopyReason::Unverifiable);
        }
    };

    if verbosity >= 3 {
        sink.log(&format!(
            "[CACHE] {}: size {}={}, hash {}={}",
            rel_path, entry.size, src_size, entry.hash, current_hash
        ));
    }

    if entry.hash != current_hash {
        return Verdict::Copy(CopyReason::HashChanged);
    }
    if !is_regular_file(dst_path) {
        return Verdict::Copy(CopyReason::DestinationMissing);
    }
    Verdict::Skip
}

#[allow(clippy::too_many_arguments)]
fn decide_validate(
    cache: &FingerprintCache,
    rel_path: &str,
    src_path: &Path,
    dst_path: &Path,
    src_size: u64,
    cache_enabled: bool,
    verbosity: u8,
    sink: &dyn EventSink,
) -> Verdict {
    if verbosity >= 2 {
        sink.log(&format!("[VALIDATE] Checking: {rel_path}"));
    }

    let Ok(dst_meta) = fs::metadata(dst_path) else {
        if verbosity >= 2 {
            sink.log(&format!(
                "[VALIDATE] MISMATCH - destination missing: {rel_path}"
            ));
        }
        return Verdict::Copy(CopyReason::DestinationMissing);
    };
    if !dst_meta.is_file() {
        return Verdict::Copy(CopyReason::DestinationMissing);
    }
    if dst_meta.len() != src_size {
        sink.log(&format!(
            "[VALIDATE] MISMATCH - size differs for {} (source {} bytes, destination {} bytes)",
            rel_path,
            src_size,
            dst_meta.len()
        ));
        return Verdict::Copy(CopyReason::SizeMismatch);
    }

    let src_fp = compute_fingerprint(src_path);
    let dst_fp = compute_fingerprint(dst_path);
    match (src_fp, dst_fp) {
        (Ok((_, src_hash)), Ok((_, dst_hash))) if src_hash == dst_hash => {
            if verbosity >= 1 {
                sink.log(&format!(
                    "[VALIDATE] OK - {rel_path} (size {src_size}, hash {src_hash})"
                ));
            }
            if cache_enabled {
                cache.put(rel_path, src_size, src_hash, chrono::Utc::now().timestamp());
            }
            Verdict::Skip
        }
        (Ok((_, src_hash)), Ok((_, dst_hash))) => {
            sink.log(&format!(
                "[VALIDATE] MISMATCH - hash differs for {rel_path} (source {src_hash}, destination {dst_hash})"
            ));
            Verdict::Copy(CopyReason::ContentMismatch)
        }
        (Err(e), _) => {
            sink.log(&format!("[VALIDATE] Cannot hash source {rel_path}: {e}"));
            Verdict::Copy(CopyReason::Unverifiable)
        }
        (_, Err(e)) => {
            sink.log(&format!("[VALIDATE] Cannot hash destination {rel_path}: {e}"));
            Verdict::Copy(CopyReason::Unverifiable)
        }
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
