//! Logging configuration for cohort-match

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;
use crate::Result;

const LOG_FILE_PREFIX: &str = "cohort-match.log";

/// Filter for `level`, unless `RUST_LOG` is set
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},cohort_match={level}")))
}

/// Initialize logging from the `[logging]` section
///
/// `verbose` forces debug regardless of the configured level.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    init_logging_with_level(level, &config.log_dir)
}

/// Initialize stderr plus daily-rolling file output
pub fn init_logging_with_level(level: &str, log_dir: &str) -> Result<()> {
    let logs_dir = Path::new(log_dir);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter(level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::CohortMatchError::Custom(format!("logging already initialized: {e}")))?;

    tracing::info!("Logging initialized with level: {}", level);
    tracing::info!("Log files will be saved to: {}/{}.YYYY-MM-DD", log_dir, LOG_FILE_PREFIX);

    // the writer thread must outlive main
    std::mem::forget(guard);

    Ok(())
}
