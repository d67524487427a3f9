//! Mirror step: prune destination entries with no source counterpart.
//!
//! Files are deleted as the walk encounters them; directories are only
//! marked, then removed after the walk completes so a directory is never
//! deleted while still being traversed. Cache rows for everything removed
//! are dropped. The first error aborts the pass; entries already deleted
//! stay deleted.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::cache::FingerprintCache;

/// Summary of one prune pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    /// Orphan files deleted.
    pub files_removed: u64,
    /// Orphan directory trees deleted.
    pub dirs_removed: u64,
}

/// Delete everything under `dest_root` that has no counterpart under
/// `source_root`, dropping the corresponding cache rows.
pub fn prune(
    source_root: &Path,
    dest_root: &Path,
    cache: &FingerprintCache,
) -> Result<PruneStats> {
    let mut stats = PruneStats::default();
    let mut deferred_dirs: Vec<(std::path::PathBuf, String)> = Vec::new();

    for entry in WalkDir::new(dest_root) {
        let entry = entry.with_context(|| {
            format!("Failed to walk destination {}", dest_root.display())
        })?;
        let dst_path = entry.path();
        if dst_path == dest_root {
            continue;
        }
        let rel = match dst_path.strip_prefix(dest_root) {
            Ok(rel) => rel_string(rel),
            Err(_) => continue,
        };
        if source_root.join(&rel).exists() {
            continue;
        }

        if entry.file_type().is_dir() {
            log::info!("Marking directory for deletion: {}", dst_path.display());
            deferred_dirs.push((dst_path.to_path_buf(), rel));
        } else {
            log::info!("Deleting extra file: {}", dst_path.display());
            fs::remove_file(dst_path)
                .with_context(|| format!("Failed to delete file {}", dst_path.display()))?;
            cache.remove(&rel);
            stats.files_removed += 1;
        }
    }

    for (dir, rel) in deferred_dirs {
        // A parent marked earlier may already have taken this one with it.
        if !dir.exists() {
            continue;
        }
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to delete directory {}", dir.display()))?;
        cache.remove(&rel);
        if let Err(e) = cache.save() {
            log::warn!("Failed to save cache after pruning {}: {}", rel, e);
        }
        stats.dirs_removed += 1;
    }

    Ok(stats)
}

/// Relative path as a forward-slash string, matching cache keys.
fn rel_string(rel: &Path) -> String {
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
