//! Usage: Tracing subscriber setup (stderr + optional daily-rolling file) and log pruning.

use crate::settings::ClientSettings;
use crate::shared::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "central-client.log";

/// Keeps the file writer flushing; drop it only at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(settings: &ClientSettings) -> AppResult<LoggingGuard> {
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(&settings.log_level));

    let (file_layer, file_guard) = match settings.log_dir.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::new("SYSTEM_ERROR", format!("failed to create log dir {}", dir.display()))
                    .with_source(e)
            })?;
            prune_old_logs(dir, settings.log_retention_days as usize);

            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .with_filter(env_filter(&settings.log_level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| format!("SYSTEM_ERROR: logging already initialized: {e}"))?;

    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        // Payload omitted: it may contain user data.
        tracing::error!(location = %location, "PANIC at {location}");
    }));

    Ok(LoggingGuard { _file: file_guard })
}

/// Keeps the newest `keep` rotated log files in `dir`.
pub(crate) fn prune_old_logs(dir: &Path, keep: usize) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut log_files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .collect();
    // Daily suffixes sort chronologically.
    log_files.sort();

    let mut removed = 0;
    if log_files.len() > keep {
        let excess = log_files.len() - keep;
        for path in &log_files[..excess] {
            if std::fs::remove_file(path).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}
