//! Logging setup with daily-rotating file output and retention cleanup.
//!
//! Console and file layers share a local-timezone timestamp format; file
//! output rotates daily and a background task prunes files older than the
//! configured retention window.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::Error;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "vigil=info,segmenter=info,reqwest=warn";

/// Daily-rotated log file prefix.
const LOG_FILE_PREFIX: &str = "vigil.log";

/// Custom timer that formats timestamps in the server's local timezone,
/// making logs easier to correlate with local time.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Initialize logging with console and daily-rotating file output.
///
/// Returns the guard for the non-blocking file writer; keep it alive for
/// the application lifetime or buffered log lines are lost on exit.
pub fn init_logging(log_dir: &str) -> crate::Result<WorkerGuard> {
    let log_path = PathBuf::from(log_dir);
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

/// Start the daily log retention cleanup task.
pub fn start_retention_cleanup(
    log_dir: PathBuf,
    retention_days: u64,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        let cleanup_interval = Duration::from_secs(24 * 60 * 60);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("log retention cleanup task shutting down");
                    break;
                }
                _ = tokio::time::sleep(cleanup_interval) => {
                    if let Err(e) = cleanup_old_logs(&log_dir, retention_days as i64).await {
                        warn!(error = %e, "failed to clean up old logs");
                    }
                }
            }
        }
    });
}

/// Delete rotated log files older than the retention window.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<()> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let cutoff_ts = cutoff.timestamp();

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let prefix = format!("{LOG_FILE_PREFIX}.");
        let date_str = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => match name.strip_prefix(&prefix) {
                Some(rest) => rest,
                None => continue,
            },
            None => continue,
        };

        // Rotated files are named vigil.log.YYYY-MM-DD.
        if let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            let file_ts = file_date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or(0);

            if file_ts < cutoff_ts {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to delete old log file");
                } else {
                    deleted_count += 1;
                    debug!(path = %path.display(), "deleted old log file");
                }
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "cleaned up old log files");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("vigil=info"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("vigil.log.2020-01-01");
        let recent = dir
            .path()
            .join(format!("vigil.log.{}", Local::now().format("%Y-%m-%d")));
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&recent, b"x").unwrap();
        std::fs::write(&unrelated, b"x").unwrap();

        cleanup_old_logs(dir.path(), 7).await.unwrap();

        assert!(!old.exists());
        assert!(recent.exists());
        assert!(unrelated.exists());
    }
}
