//! Source tree enumeration.
//!
//! Produces the two ordered lists the engine consumes: relative directory
//! paths and relative file paths, both POSIX-style relative to the source
//! root, in deterministic (name-sorted) order.

use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// The enumerated source tree.
#[derive(Debug, Default)]
pub struct SourceTree {
    /// Relative directory paths, parents before children.
    pub dirs: Vec<String>,
    /// Relative file paths.
    pub files: Vec<String>,
    /// Sum of all file sizes, for the progress grand total.
    pub total_bytes: u64,
}

/// Walk `source_root` and collect ordered directory and file lists.
///
/// Enumeration errors abort the walk; per-file size lookups already
/// happened during traversal so the byte total is exact for the returned
/// list.
pub fn enumerate(source_root: &Path) -> Result<SourceTree> {
    let mut tree = SourceTree::default();
    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Error gathering file list under {}", source_root.display()))?;
        let rel = match entry.path().strip_prefix(source_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel_string(rel),
            _ => continue,
        };
        if entry.file_type().is_dir() {
            tree.dirs.push(rel);
        } else {
            let size = entry
                .metadata()
                .map(|m| m.len())
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            tree.total_bytes += size;
            tree.files.push(rel);
        }
    }
    Ok(tree)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collects_ordered_dirs_and_files_with_byte_total() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("top.txt"), b"12345").unwrap();
        fs::write(dir.path().join("b/inner/deep.txt"), b"123").unwrap();

        let tree = enumerate(dir.path()).unwrap();
        assert_eq!(tree.dirs, vec!["a", "b", "b/inner"]);
        assert_eq!(tree.files, vec!["b/inner/deep.txt", "top.txt"]);
        assert_eq!(tree.total_bytes, 8);
    }

    #[test]
    fn empty_root_yields_empty_lists() {
        let dir = tempdir().unwrap();
        let tree = enumerate(dir.path()).unwrap();
        assert!(tree.dirs.is_empty());
        assert!(tree.files.is_empty());
        assert_eq!(tree.total_bytes, 0);
    }
}
