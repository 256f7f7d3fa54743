//! `trellis-config`: project configuration for the Trellis plugin router.
//!
//! Provides:
//! - Typed config schema (project, environments, providers, router, logging)
//! - YAML loading and JSON merge patching
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

// Re-export most-used types at crate root.
pub use schema::{EnvironmentConfig, LoggingConfig, ProviderConfig, RouterConfig, TrellisConfig};
pub use io::{apply_merge_patch, config_dir, config_file_path, json_merge_patch, load_config, load_raw_config};
pub use env::{
    collect_referenced_vars, contains_env_var_reference, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use defaults::apply_all_defaults;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// Load, apply env substitution, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Validation
/// findings are logged; callers that need to reject an invalid config run
/// [`validate`] themselves.
pub async fn load_and_prepare(path: &Path) -> Result<TrellisConfig> {
    let value = load_raw_config(path).await?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    prepare(value)
}

/// Run the post-load pipeline on an already parsed value tree.
pub fn prepare(value: Value) -> Result<TrellisConfig> {
    let config: TrellisConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(config)
}

/// Project variables with the active environment's variables merged over them.
pub fn resolve_variables(config: &TrellisConfig) -> Map<String, Value> {
    let mut merged = Value::Object(config.variables.clone());
    let overrides = config
        .environment
        .as_deref()
        .and_then(|name| config.environment(name));
    if let Some(env) = overrides {
        json_merge_patch(&mut merged, &Value::Object(env.variables.clone()));
    }
    match merged {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
