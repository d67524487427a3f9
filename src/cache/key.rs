//! Cache file location derivation.
//!
//! Every (source, destination) pair maps to its own store file so runs on
//! the same pair reuse the cache and different pairs never collide. The
//! name combines sanitized base names (human-readable) with a short digest
//! of both absolute paths (collision resistance).

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Fixed cache directory, relative to the process working directory.
pub const CACHE_DIR: &str = ".cachecopy";

/// Derive the cache store path for a (source, destination) pair.
///
/// Both inputs are made absolute and stripped of trailing separators
/// before hashing, so `src/` and `src` map to the same store. The result
/// is stable across runs and filesystem-safe on both path-separator
/// conventions.
#[must_use]
pub fn derive_cache_key(src: &Path, dst: &Path) -> PathBuf {
    let abs_src = absolute_key(src);
    let abs_dst = absolute_key(dst);

    let digest = Sha256::digest(format!("{abs_src}|{abs_dst}").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    let src_base = sanitize(base_name(&abs_src));
    let dst_base = sanitize(base_name(&abs_dst));

    PathBuf::from(CACHE_DIR).join(format!("{}_to_{}_{}.json", src_base, dst_base, &hex[..8]))
}

/// Absolute form of `path` with trailing separators stripped, as a string.
fn absolute_key(path: &Path) -> String {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let s = abs.to_string_lossy();
    let trimmed = s.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        s.into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Final component of an already-trimmed path string.
fn base_name(s: &str) -> &str {
    s.rsplit(['/', '\\']).next().unwrap_or(s)
}

/// Replace characters that are unsafe in file names.
fn sanitize(name: &str) -> String {
    name.replace([':', ' '], "_")
}
