//! # Logging Setup
//!
//! Installs the global `tracing` subscriber:
//! - log level from `RUST_LOG`, falling back to the configured level;
//! - human-readable ANSI console output with targets;
//! - JSON lines in a daily rotating file named after the application.

use std::io;
use std::path::Path;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes logging and returns the file writer guard.
///
/// The guard must be held for the lifetime of the process, otherwise
/// buffered file output is lost.
///
/// # Errors
/// Fails if the log directory cannot be created, the level is not a valid
/// filter directive, or a global subscriber is already installed.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, app_name);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .json();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    info!(log_dir = %log_dir.display(), "Logging initialized with level: {}", log_level);
    Ok(guard)
}
