//! Operator logging: stdout always, plus an optional daily-rotated file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Rotated log files kept on disk, one per day.
pub const LOG_RETENTION_DAYS: usize = 7;

/// Install the global subscriber. `LOG_LEVEL` drives the filter.
///
/// The returned guard flushes the file writer and must live as long as
/// the process logs.
pub fn init(log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file.and_then(split_log_path) {
        Some((dir, prefix)) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(LOG_RETENTION_DAYS)
                .build(&dir)
                .with_context(|| format!("could not open log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;

    Ok(guard)
}

/// Split `LOG_FILE` into the directory and the file name prefix the
/// rotating appender dates. Blank values disable file logging.
pub fn split_log_path(log_file: &str) -> Option<(PathBuf, String)> {
    let trimmed = log_file.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = Path::new(trimmed);
    let prefix = path.file_name()?.to_string_lossy().into_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path("logs/keepalive.log"),
            Some((PathBuf::from("logs"), "keepalive.log".to_string()))
        );
        assert_eq!(split_log_path("bot.log"), Some((PathBuf::from("."), "bot.log".to_string())));
        assert_eq!(
            split_log_path(" /var/log/bot/run.log "),
            Some((PathBuf::from("/var/log/bot"), "run.log".to_string()))
        );
    }

    #[test]
    fn test_blank_log_path_disables_file_logging() {
        assert_eq!(split_log_path(""), None);
        assert_eq!(split_log_path("   "), None);
        assert_eq!(split_log_path("logs/.."), None);
    }
}
