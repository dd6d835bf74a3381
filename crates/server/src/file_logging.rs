//! Console and optional file-based logging.
//!
//! When enabled via the `GITFABLES_FILE_LOGGING` environment variable, logs are
//! written to rotating daily log files in addition to console output.
//!
//! # Configuration
//!
//! - `GITFABLES_FILE_LOGGING`: Set to "true" or "1" to enable file logging
//! - `GITFABLES_LOG_DIR`: Log directory (defaults to `./logs`)
//! - `GITFABLES_LOG_MAX_FILES`: Number of daily log files to retain (default: 7)
//!
//! Log files are JSON, one event per line:
//! ```json
//! {"timestamp":"2025-03-01T10:30:00Z","level":"INFO","target":"server","message":"..."}
//! ```
//!
//! Errors are also forwarded to Sentry once `utils::sentry::init_once` has
//! been called with a DSN.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "gitfables.log";
const DEFAULT_MAX_FILES: usize = 7;

#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub log_dir: PathBuf,
    /// Number of daily log files to retain.
    pub max_files: usize,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl FileLoggingConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("GITFABLES_FILE_LOGGING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let log_dir = lookup("GITFABLES_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"));

        let max_files = lookup("GITFABLES_LOG_MAX_FILES")
            .and_then(|s| s.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_MAX_FILES);

        Self {
            enabled,
            log_dir,
            max_files,
        }
    }
}

fn filter_string(log_level: &str) -> String {
    format!(
        "warn,server={level},services={level},utils={level},tower_http={level}",
        level = log_level
    )
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_string(log_level)).unwrap_or_else(|error| {
        eprintln!("Invalid log level `{log_level}` ({error}); falling back to info");
        EnvFilter::new(filter_string("info"))
    })
}

/// Initialize logging. The returned guard must be held for the lifetime of
/// the application so buffered file logs are flushed; it is `None` when file
/// logging is disabled.
pub fn init_logging(log_level: &str) -> Option<WorkerGuard> {
    let config = FileLoggingConfig::default();

    let console_layer = tracing_subscriber::fmt::layer().with_filter(env_filter(log_level));

    if config.enabled {
        if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
            eprintln!("Failed to create log directory {:?}: {}", config.log_dir, e);
            tracing_subscriber::registry()
                .with(console_layer)
                .with(utils::sentry::sentry_layer())
                .init();
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(env_filter(log_level));

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .with(utils::sentry::sentry_layer())
            .init();

        tracing::info!(
            log_dir = ?config.log_dir,
            max_files = config.max_files,
            "File logging enabled"
        );

        let log_dir = config.log_dir.clone();
        let max_files = config.max_files;
        std::thread::spawn(move || {
            cleanup_old_logs(&log_dir, max_files);
        });

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(utils::sentry::sentry_layer())
            .init();
        None
    }
}

/// Keep only the `max_files` most recently modified log files.
fn cleanup_old_logs(log_dir: &Path, max_files: usize) {
    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .filter_map(|e| {
            e.metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| (e.path(), t))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            tracing::debug!("Removed old log file: {:?}", path);
        }
    }
}
