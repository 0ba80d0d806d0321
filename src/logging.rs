use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Debug log written next to other temp files, e.g. %TEMP%\reminder-engine-debug.log
pub const DEBUG_LOG_FILE: &str = "reminder-engine-debug.log";

/// Get the debug log file path
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join(DEBUG_LOG_FILE)
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install a stderr subscriber. `RUST_LOG` overrides `default_level`.
/// Fails if a global subscriber is already set.
pub fn init(default_level: &str) -> AppResult<()> {
    fmt()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_level(true)
        .try_init()
        .map_err(|e| AppError::config(format!("logging already initialized: {}", e)))
}

/// Like [`init`], and also append plain-text output to [`log_path`].
pub fn init_with_debug_file(default_level: &str) -> AppResult<PathBuf> {
    let path = log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AppError::storage(format!("failed to open {}: {}", path.display(), e)))?;

    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| AppError::config(format!("logging already initialized: {}", e)))?;

    Ok(path)
}
