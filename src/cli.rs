//! Command-line interface definitions for cachecopy.
//!
//! All arguments are defined with the clap derive API. SRC and DST are
//! captured as raw strings because a trailing separator on SRC is
//! meaningful: `src/` copies the *contents* of the source directory into
//! DST, while `src` copies the directory itself as `DST/src`.
//!
//! # Example
//!
//! ```bash
//! # Copy with the default TUI front-end
//! cachecopy /data/photos /backup
//!
//! # Mirror with classic terminal output and 8 workers
//! cachecopy /data/photos/ /backup/photos --mirror --no-tui --workers 8
//!
//! # Full byte-level verification
//! cachecopy /data/photos /backup --validate -vv
//! ```

use clap::Parser;

/// Cache-validated concurrent directory copier.
///
/// Copies a source tree into a destination tree, skipping files whose
/// content is provably unchanged since the last run based on a persistent
/// per-file fingerprint cache.
#[derive(Debug, Parser)]
#[command(name = "cachecopy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source directory (trailing separator copies contents, not the directory)
    #[arg(value_name = "SRC")]
    pub src: String,

    /// Destination directory
    #[arg(value_name = "DST")]
    pub dst: String,

    /// Number of concurrent copy workers (default: available CPU cores)
    #[arg(long, value_name = "N", default_value_t = default_workers())]
    pub workers: usize,

    /// Buffer size for file copy operations (e.g. 4MB, 256KB, 1048576)
    #[arg(long, value_name = "SIZE", default_value = "4MB", value_parser = parse_size)]
    pub buffer_size: u64,

    /// Disable cache: always copy all files
    #[arg(long)]
    pub no_cache: bool,

    /// Validate files by comparing size and hash between source and destination
    ///
    /// Slower but 100% accurate - ignores cached trust and checks actual content.
    #[arg(long)]
    pub validate: bool,

    /// Mirror source to destination: delete extra destination entries not in the source
    #[arg(long)]
    pub mirror: bool,

    /// Delete the cache file before starting (forces a fresh copy of all files)
    #[arg(long)]
    pub clear_cache: bool,

    /// Maximum age (in days) for cache entries; older entries are evicted
    #[arg(long, value_name = "DAYS", default_value_t = 90)]
    pub max_cache_age: u64,

    /// Automatically clean stale cache entries on every run
    ///
    /// Use --auto-clean=false to disable.
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_clean: bool,

    /// Path to a log file (operational output is also written there)
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<std::path::PathBuf>,

    /// Disable the TUI and use classic terminal output
    #[arg(long)]
    pub no_tui: bool,

    /// Increase verbosity (-v large file operations, -vv all operations, -vvv cache debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB (decimal and binary).
/// A bare number is taken as bytes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    let bytes = (num * multiplier as f64) as u64;
    if bytes == 0 {
        return Err("Buffer size must be at least one byte".to_string());
    }
    Ok(bytes)
}
