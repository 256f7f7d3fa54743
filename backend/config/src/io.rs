//! Config file loading and merge patching.

use crate::schema::TrellisConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "trellis.yaml";

/// Resolve the Trellis config directory.
/// Priority: `TRELLIS_CONFIG_DIR` env > `~/.trellis/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRELLIS_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".trellis"),
        None => PathBuf::from(".trellis"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as a raw value tree, before env substitution.
///
/// Returns an empty object if the file doesn't exist.
pub async fn load_raw_config(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    // An empty YAML document parses as null.
    Ok(if value.is_null() { Value::Object(Default::default()) } else { value })
}

/// Load and parse the config from disk without further processing.
pub async fn load_config(path: &Path) -> Result<TrellisConfig> {
    let value = load_raw_config(path).await?;
    serde_json::from_value(value)
        .with_context(|| format!("Invalid config at: {}", path.display()))
}

/// Patch config with a JSON Merge Patch (RFC 7396).
pub fn apply_merge_patch(config: &TrellisConfig, patch: &Value) -> Result<TrellisConfig> {
    let mut value = serde_json::to_value(config)
        .context("Failed to serialize config for merge patch")?;
    json_merge_patch(&mut value, patch);
    let updated: TrellisConfig = serde_json::from_value(value)
        .context("Failed to deserialize config after merge patch")?;
    Ok(updated)
}

/// RFC 7396 JSON Merge Patch algorithm.
pub fn json_merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if !target.is_object() {
            *target = Value::Object(Default::default());
        }
        if let Value::Object(target_map) = target {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                    json_merge_patch(entry, patch_val);
                }
            }
        }
    } else {
        // Scalars and arrays replace the target entirely.
        *target = patch.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_adds_key() {
        let base = TrellisConfig::default();
        let patch = json!({ "logging": { "level": "debug" } });
        let result = apply_merge_patch(&base, &patch).unwrap();
        assert_eq!(result.logging.unwrap().level.unwrap(), "debug");
    }

    #[test]
    fn test_merge_patch_removes_key() {
        let mut base = TrellisConfig::default();
        base.logging = Some(crate::schema::LoggingConfig {
            level: Some("info".to_string()),
            ..Default::default()
        });
        let patch = json!({ "logging": null });
        let result = apply_merge_patch(&base, &patch).unwrap();
        assert!(result.logging.is_none());
    }

    #[test]
    fn test_merge_patch_nested_objects() {
        let mut target = json!({ "db": { "host": "localhost", "port": 5432 }, "tags": [1] });
        json_merge_patch(&mut target, &json!({ "db": { "port": 6543 }, "tags": [2, 3] }));
        assert_eq!(target, json!({ "db": { "host": "localhost", "port": 6543 }, "tags": [2, 3] }));
    }

    #[tokio::test]
    async fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(cfg, TrellisConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "project: shop\nenvironment: local\n").unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.project, "shop");
        assert_eq!(cfg.environment.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "project: [unterminated").unwrap();
        let err = load_config(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config YAML"));
    }
}
