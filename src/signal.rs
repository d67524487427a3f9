//! Signal handling for graceful shutdown.
//!
//! Ctrl+C sets a shared `AtomicBool` that workers check between queue
//! items. The cache is flushed on the normal exit path, so an interrupted
//! run keeps every entry recorded up to the interruption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown flag, set when a termination signal arrives.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with shutdown not yet requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for sharing with worker threads.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Install the Ctrl+C handler and return the shared shutdown handle.
pub fn install_handler() -> Result<ShutdownHandler, ctrlc::Error> {
    let handler = ShutdownHandler::new();
    let flag = handler.flag();
    ctrlc::set_handler(move || {
        eprintln!("Interrupted. Finishing in-flight files and saving the cache...");
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(handler)
}
