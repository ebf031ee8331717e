//! Logging setup for ragprompt
//!
//! Human-readable lines go to stderr so stdout carries only the prompt.
//! An optional append-mode file receives everything at debug level.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Verbosity;

/// Stderr filter: `RUST_LOG` wins, otherwise the verbosity level
pub fn stderr_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Open (creating parent directories) a log file for appending
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
///
/// A log file that cannot be opened is reported once through the new
/// subscriber; logging continues on stderr only.
pub fn init_logging(verbosity: Verbosity, log_file: Option<PathBuf>) {
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(stderr_filter(verbosity));

    let mut open_error = None;
    let file_layer = log_file.as_ref().and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG),
        ),
        Err(e) => {
            open_error = Some((path.clone(), e));
            None
        }
    });

    // A subscriber may already be set (tests); keep the existing one
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some((path, e)) = open_error {
        tracing::warn!("could not open log file {}: {}; logging to stderr only", path.display(), e);
    }
}
