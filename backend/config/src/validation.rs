//! Config validation: checks with user-friendly error messages.

use crate::schema::TrellisConfig;
use std::collections::HashSet;
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &TrellisConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_project(config, &mut report);
    validate_environments(config, &mut report);
    validate_providers(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_project(config: &TrellisConfig, report: &mut ValidationReport) {
    if config.project.trim().is_empty() {
        report.error("project", "Project name cannot be empty");
    }
}

fn validate_environments(config: &TrellisConfig, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (i, env) in config.environments.iter().enumerate() {
        if env.name.trim().is_empty() {
            report.error(format!("environments[{i}].name"), "Environment name cannot be empty");
        } else if !seen.insert(env.name.as_str()) {
            report.error(
                format!("environments[{i}].name"),
                format!("Environment '{}' is declared more than once", env.name),
            );
        }
    }

    let Some(active) = &config.environment else { return };
    if !config.environments.is_empty() && config.environment(active).is_none() {
        report.error(
            "environment",
            format!("Environment '{active}' is not declared in environments"),
        );
    }
}

fn validate_providers(config: &TrellisConfig, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let path = format!("providers[{i}]");
        if provider.name.trim().is_empty() {
            report.error(format!("{path}.name"), "Provider name cannot be empty");
        } else if !seen.insert(provider.name.as_str()) {
            report.error(
                format!("{path}.name"),
                format!("Provider '{}' is configured more than once", provider.name),
            );
        }
        if !(provider.config.is_object() || provider.config.is_null()) {
            report.error(format!("{path}.config"), "Provider config must be a mapping");
        }
    }
}

fn validate_logging(config: &TrellisConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.warn(
                "logging.level",
                format!("Unknown log level '{level}'. Use one of: {}", LOG_LEVELS.join(", ")),
            );
        }
    }
    if logging.json == Some(true) && logging.dir.is_none() {
        report.warn("logging.dir", "JSON logging is enabled but no log directory is set");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnvironmentConfig, LoggingConfig, ProviderConfig};
    use serde_json::json;

    fn config() -> TrellisConfig {
        TrellisConfig { project: "shop".into(), ..Default::default() }
    }

    #[test]
    fn minimal_config_is_valid() {
        let report = validate(&config());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn empty_project_is_error() {
        let report = validate(&TrellisConfig::default());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "project");
    }

    #[test]
    fn undeclared_environment_is_error() {
        let mut cfg = config();
        cfg.environments = vec![EnvironmentConfig { name: "local".into(), ..Default::default() }];
        cfg.environment = Some("prod".into());
        let report = validate(&cfg);
        assert_eq!(report.errors[0].path, "environment");
    }

    #[test]
    fn duplicate_provider_is_error() {
        let mut cfg = config();
        let provider = ProviderConfig { name: "kubernetes".into(), config: json!({}) };
        cfg.providers = vec![provider.clone(), provider];
        let report = validate(&cfg);
        assert!(report.errors[0].message.contains("more than once"));
    }

    #[test]
    fn unknown_log_level_is_warning() {
        let mut cfg = config();
        cfg.logging = Some(LoggingConfig { level: Some("loud".into()), ..Default::default() });
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "logging.level");
    }
}
