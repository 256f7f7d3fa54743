//! Config defaults: applies default values to parsed config.

use crate::schema::{LoggingConfig, TrellisConfig};

/// Environment used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: TrellisConfig) -> TrellisConfig {
    let config = apply_environment_defaults(config);
    let config = apply_router_defaults(config);
    apply_logging_defaults(config)
}

/// Pick the first declared environment, or `default`.
fn apply_environment_defaults(mut config: TrellisConfig) -> TrellisConfig {
    if config.environment.is_none() {
        let name = config
            .environments
            .first()
            .map(|e| e.name.clone())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        config.environment = Some(name);
    }
    config
}

fn apply_router_defaults(mut config: TrellisConfig) -> TrellisConfig {
    let router = config.router.take().unwrap_or_default();
    config.router = Some(router.with_defaults());
    config
}

fn apply_logging_defaults(mut config: TrellisConfig) -> TrellisConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    if logging.json.is_none() {
        logging.json = Some(false);
    }
    config
}
