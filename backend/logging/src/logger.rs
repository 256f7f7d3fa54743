//! Structured Logger
//!
//! Wraps `tracing` to provide console output, optional JSON file rotation
//! (NDJSON), and environment-based level control.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trellis_config::LoggingConfig;

/// File name prefix of the rolling log, e.g. `trellis.log.2026-01-31`.
pub const LOG_FILE_PREFIX: &str = "trellis.log";

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";

/// Initialize the global structured logger.
///
/// `RUST_LOG` takes precedence over the configured level. The JSON file layer
/// is only installed when `json` is enabled. Calling this twice is a no-op.
pub fn init_logger(config: &LoggingConfig) {
    let level = config.level.as_deref().unwrap_or(DEFAULT_LEVEL);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = config.json.unwrap_or(false).then(|| {
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir(config), LOG_FILE_PREFIX);
        fmt::layer()
            .json()
            .with_writer(appender)
            .with_ansi(false)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn log_dir(config: &LoggingConfig) -> PathBuf {
    PathBuf::from(config.dir.as_deref().unwrap_or(DEFAULT_LOG_DIR))
}
