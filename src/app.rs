//! Application wiring: run-order around the copy engine.
//!
//! Order of operations for one run: clear-cache, load, auto-clean of
//! missing sources, mirror, age eviction, enumeration, destination
//! directory creation, then the concurrent copy under the selected
//! front-end, ending with a final cache save and a summary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::cache::{derive_cache_key, evict_stale, FingerprintCache, CACHE_DIR};
use crate::cli::Cli;
use crate::engine::{self, CopyOptions, CopyStats, EngineError, EventSink};
use crate::error::ExitCode;
use crate::mirror;
use crate::progress::ConsoleFrontEnd;
use crate::signal::{self, ShutdownHandler};
use crate::walk;
use crate::{logging, tui};

/// Total buffer allocation above this triggers a memory warning.
const BUFFER_WARN_LIMIT: u64 = 2 * 1024 * 1024 * 1024;

/// Run the whole application. Returns the process exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let (src_root, dest_root) = resolve_roots(&cli.src, &cli.dst)?;

    fs::create_dir_all(CACHE_DIR)
        .with_context(|| format!("Failed to create cache directory {CACHE_DIR}"))?;
    let cache_path = derive_cache_key(&src_root, &dest_root);
    log::info!("Using cache file: {}", cache_path.display());

    if cli.clear_cache {
        match fs::remove_file(&cache_path) {
            Ok(()) => log::info!("Cache deleted: {}", cache_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to delete cache {}", cache_path.display())
                })
            }
        }
    }

    let cache = FingerprintCache::load(cache_path);

    if cli.auto_clean {
        let removed = cache.prune_missing(&src_root);
        if removed > 0 {
            log::info!("Auto-cleaned {removed} stale cache entries");
            save_cache(&cache);
        }
    }

    if cli.mirror {
        fs::create_dir_all(&dest_root).with_context(|| {
            format!(
                "Failed to create root destination directory {}",
                dest_root.display()
            )
        })?;
        let stats = mirror::prune(&src_root, &dest_root, &cache)
            .context("Error deleting extra destination files")?;
        if stats.files_removed > 0 || stats.dirs_removed > 0 {
            log::info!(
                "Mirror removed {} files and {} directories",
                stats.files_removed,
                stats.dirs_removed
            );
        }
        save_cache(&cache);
    }

    let report = evict_stale(&cache, cli.max_cache_age, chrono::Utc::now().timestamp())
        .context("Failed to evict stale cache entries")?;
    if report.store_deleted {
        log::info!(
            "All cache entries older than {} days, cache file deleted",
            cli.max_cache_age
        );
    } else if report.evicted > 0 {
        log::info!("Evicted {} cache entries past the age threshold", report.evicted);
        save_cache(&cache);
    }

    let tree = walk::enumerate(&src_root)?;
    for rel_dir in &tree.dirs {
        let dir = dest_root.join(rel_dir);
        if let Err(e) = fs::create_dir_all(&dir) {
            log::error!("Failed to create directory {}: {}", dir.display(), e);
        }
    }

    let total_buffer = cli.workers as u64 * cli.buffer_size;
    if total_buffer > BUFFER_WARN_LIMIT {
        log::warn!(
            "Total buffer allocation is {} ({} workers x {}); consider reducing --workers or --buffer-size",
            bytesize::ByteSize::b(total_buffer),
            cli.workers,
            bytesize::ByteSize::b(cli.buffer_size)
        );
    }

    let shutdown = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            log::warn!("Failed to install Ctrl+C handler: {e}");
            ShutdownHandler::new()
        }
    };

    let opts = CopyOptions {
        source_root: src_root,
        dest_root,
        workers: cli.workers.max(1),
        buffer_size: cli.buffer_size as usize,
        no_cache: cli.no_cache,
        validate: cli.validate,
        verbosity: cli.verbose,
        shutdown: shutdown.flag(),
    };

    let mut banner = vec![
        format!("[INFO] Using {} worker(s)", opts.workers),
        format!(
            "[INFO] Using buffer size: {} ({} bytes)",
            bytesize::ByteSize::b(cli.buffer_size),
            cli.buffer_size
        ),
        format!(
            "[INFO] {} files, {} to process",
            tree.files.len(),
            bytesize::ByteSize::b(tree.total_bytes)
        ),
    ];
    if cli.validate {
        banner.push("[VALIDATE] Validation mode enabled - all files will be verified".to_string());
    }

    let start = Instant::now();
    let result = if cli.no_tui {
        let frontend = ConsoleFrontEnd::new(tree.total_bytes, cli.quiet, cli.log_path.as_deref());
        for line in &banner {
            frontend.log(line);
        }
        let result = engine::run(&tree.files, tree.total_bytes, &cache, &opts, &frontend);
        frontend.finish();
        result
    } else {
        tui::run_with_ui(
            tree.total_bytes,
            cli.log_path.as_deref(),
            &shutdown,
            &banner,
            |sink| engine::run(&tree.files, tree.total_bytes, &cache, &opts, sink),
        )
        .context("Terminal UI failed")?
    };

    if opts.cache_enabled() {
        save_cache(&cache);
    }

    match result {
        Ok(stats) => {
            report_summary(&stats, cli.validate, start);
            Ok(ExitCode::Success)
        }
        Err(EngineError::Interrupted) => {
            log::warn!("Run interrupted; cache saved");
            Ok(ExitCode::Interrupted)
        }
        Err(EngineError::Fatal(_)) => {
            // Already reported through the fatal sink.
            Ok(ExitCode::GeneralError)
        }
    }
}

fn report_summary(stats: &CopyStats, validate: bool, start: Instant) {
    if validate {
        log::info!("Validation completed for all files");
    }
    log::info!(
        "Copy process completed: {} copied, {} skipped, {} written in {:.1?}",
        stats.files_copied,
        stats.files_skipped,
        bytesize::ByteSize::b(stats.bytes_copied),
        start.elapsed()
    );
    if stats.files_unreadable > 0 {
        log::warn!("{} source files could not be read", stats.files_unreadable);
    }
}

fn save_cache(cache: &FingerprintCache) {
    if let Err(e) = cache.save() {
        log::warn!("Failed to save cache: {e}");
    }
}

/// Resolve the SRC and DST arguments into engine roots.
///
/// A trailing separator on SRC means "copy the contents of src into
/// dst"; without it the source directory itself becomes dst/<base>.
fn resolve_roots(src: &str, dst: &str) -> Result<(PathBuf, PathBuf)> {
    let copy_contents = src.ends_with('/') || src.ends_with('\\');
    let src_root = PathBuf::from(src.trim_end_matches(['/', '\\']));
    let dest_root = if copy_contents {
        PathBuf::from(dst)
    } else {
        let base = src_root
            .file_name()
            .with_context(|| format!("Cannot determine base name of source '{src}'"))?;
        Path::new(dst).join(base)
    };
    Ok((src_root, dest_root))
}
