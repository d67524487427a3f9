//! Plain-terminal front-end.
//!
//! Renders aggregate progress as an indicatif byte bar and prints the
//! engine's operational lines above it. With `--log-path`, every
//! operational line is also appended to the log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::EventSink;

/// Optional append-only tee of operational lines to a log file.
#[derive(Debug, Default)]
pub struct LogTee {
    file: Option<Mutex<File>>,
}

impl LogTee {
    /// Open `path` for appending, or an inert tee when `path` is `None`.
    ///
    /// A file that cannot be opened degrades to console-only output with
    /// a diagnostic, mirroring how a missing cache degrades the run.
    #[must_use]
    pub fn open(path: Option<&Path>) -> Self {
        let file = path.and_then(|p| {
            match OpenOptions::new().create(true).append(true).open(p) {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    log::error!("Failed to open log file {}: {}", p.display(), e);
                    None
                }
            }
        });
        Self { file }
    }

    /// Append one line to the log file, if any.
    pub fn write_line(&self, line: &str) {
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = writeln!(file, "{line}") {
                log::warn!("Failed to write log file: {e}");
            }
        }
    }
}

/// Timestamp prefix used on operational lines.
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Console front-end: byte progress bar plus printed log lines.
pub struct ConsoleFrontEnd {
    bar: ProgressBar,
    tee: LogTee,
    quiet: bool,
}

impl ConsoleFrontEnd {
    /// Create the front-end for a run totalling `total_bytes`.
    #[must_use]
    pub fn new(total_bytes: u64, quiet: bool, log_path: Option<&Path>) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total_bytes);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bytes}/{total_bytes} [{bar:40}] {percent:>3}% | {elapsed}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
            );
            bar.enable_steady_tick(Duration::from_millis(500));
            bar
        };
        Self {
            bar,
            tee: LogTee::open(log_path),
            quiet,
        }
    }

    /// Finish the bar and leave it on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }
}

impl EventSink for ConsoleFrontEnd {
    fn log(&self, line: &str) {
        let stamped = format!("[{}] {}", timestamp(), line);
        if !self.quiet {
            self.bar.println(&stamped);
        }
        self.tee.write_line(&stamped);
    }

    fn progress(&self, copied: u64, _total: u64) {
        self.bar.set_position(copied);
    }

    fn fatal(&self, line: &str) {
        let stamped = format!("[{}] [FATAL] {}", timestamp(), line);
        self.bar.abandon();
        eprintln!("{stamped}");
        self.tee.write_line(&stamped);
    }
}
