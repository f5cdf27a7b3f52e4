use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

const LOG_FILE: &str = "kubedeck.log";

fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. With a log directory, output goes to a
/// daily rolling file so the dashboard's terminal stays clean; the returned
/// guard must live until exit to flush it. Otherwise logs go to stderr.
pub fn init_tracing(settings: &Settings) -> Result<Option<WorkerGuard>> {
    match &settings.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (nonblocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter(settings))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(nonblocking),
                )
                .try_init()
                .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter(settings))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_falls_back_to_info() {
        let settings = Settings {
            log_filter: "kubedeck_core=loud".to_string(),
            ..Default::default()
        };
        assert_eq!(env_filter(&settings).to_string(), "info");
    }

    #[test]
    fn file_logging_returns_a_flush_guard() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            log_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        // Another test may already own the global subscriber.
        if let Ok(guard) = init_tracing(&settings) {
            assert!(guard.is_some());
        }
    }
}
