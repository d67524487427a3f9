//! cachecopy - Cache-Validated Concurrent Directory Copier
//!
//! Synchronizes a source directory tree into a destination tree, skipping
//! files whose content is provably unchanged since the last run. A
//! persistent per-file fingerprint cache (size, xxh64 hash, recorded
//! time) backs the skip decision; a fixed pool of workers drains the file
//! list concurrently while keeping the cache consistent.

pub mod app;
pub mod cache;
pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod progress;
pub mod signal;
pub mod transfer;
pub mod tui;
pub mod walk;

pub use app::run_app;
