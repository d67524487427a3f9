//! Cache-validated concurrent copy engine.
//!
//! The engine consumes a pre-enumerated list of relative file paths and,
//! for each path, decides whether the file must be (re)copied
//! ([`decision`]), performs the transfer, and keeps the fingerprint cache
//! consistent while a fixed pool of workers drains the list
//! ([`orchestrator`]).

pub mod decision;
pub mod orchestrator;

pub use decision::{decide, CopyReason, Verdict};
pub use orchestrator::{run, CopyStats};

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// How the decision engine treats the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Trust matching cache entries, re-hashing the source to confirm.
    Normal,
    /// Bypass the cache entirely; always copy.
    NoCache,
    /// Bypass cached trust and re-verify actual destination bytes.
    Validate,
}

/// Configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Absolute source root.
    pub source_root: PathBuf,
    /// Absolute destination root.
    pub dest_root: PathBuf,
    /// Number of concurrent copy workers.
    pub workers: usize,
    /// Per-worker transfer buffer size in bytes.
    pub buffer_size: usize,
    /// Disable cache lookups and updates.
    pub no_cache: bool,
    /// Re-verify destination bytes instead of trusting the cache.
    pub validate: bool,
    /// Operational verbosity (0 quiet, 1 large files, 2 all files, 3 cache debug).
    pub verbosity: u8,
    /// Cooperative shutdown flag; set externally (Ctrl+C) or by a fatal error.
    pub shutdown: Arc<AtomicBool>,
}

impl CopyOptions {
    /// Effective decision mode for this run.
    #[must_use]
    pub fn mode(&self) -> CopyMode {
        if self.validate {
            CopyMode::Validate
        } else if self.no_cache {
            CopyMode::NoCache
        } else {
            CopyMode::Normal
        }
    }

    /// Whether cache entries are read and written this run.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        !self.no_cache
    }
}

/// Sink for everything the engine reports to its front-end.
///
/// `fatal` is invoked at most once per run, after the cache has been
/// flushed; the run then halts.
pub trait EventSink: Send + Sync {
    /// An operational log line (skip/copy/validate outcomes, diagnostics).
    fn log(&self, line: &str);
    /// Aggregate progress: bytes accounted for so far out of the grand total.
    fn progress(&self, copied: u64, total: u64);
    /// A fatal condition; the run is halting.
    fn fatal(&self, line: &str);
}

/// Errors that abort an engine run.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// A structural I/O failure halted the run (already reported through
    /// the fatal sink).
    #[error("{0}")]
    Fatal(String),

    /// The run was interrupted before draining the queue.
    #[error("Copy interrupted")]
    Interrupted,
}
