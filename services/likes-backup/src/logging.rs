//!
//! src/logging.rs  Andrew Belles  Oct 17th, 2026
//!
//! Initializes logger. The subscriber is installed once by main,
//! everything else only emits tracing events
//!
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::BackupError;

/// Keep alive until exit, dropping it flushes buffered lines.
pub struct LoggingGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

fn filter(cfg: &LoggingConfig) -> Result<EnvFilter, BackupError> {
    let parsed = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&cfg.filter_directives)
    };
    parsed.map_err(|e| BackupError::Config(format!("log filter: {e}")))
}

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, BackupError> {
    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = filter(cfg)?;
    let time = fmt::time::UtcTime::rfc_3339();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_ansi(false)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(layer).try_init()
        },
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_ansi(cfg.with_ansi)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line);
            registry.with(layer).try_init()
        }
    };
    installed.map_err(|e| BackupError::Config(format!("logger already set: {e}")))?;

    Ok( LoggingGuard(guard) )
}
