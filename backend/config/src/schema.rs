//! Trellis project configuration schema.
//!
//! Typed for serde YAML/JSON deserialization with camelCase keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a Trellis project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrellisConfig {
    /// Project name, exposed to templates as `project.name`
    #[serde(default)]
    pub project: String,

    /// Active environment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Declared environments and their variable overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<EnvironmentConfig>,

    /// Project-wide template variables (`var.*`)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    /// Provider configuration per plugin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,

    /// Dispatch behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl TrellisConfig {
    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Router settings, falling back to defaults when the section is absent.
    pub fn router_settings(&self) -> RouterConfig {
        self.router.clone().unwrap_or_default().with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Environments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub name: String,
    /// Merged over the project variables when this environment is active
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Name of the plugin the configuration belongs to
    pub name: String,
    #[serde(default)]
    pub config: Value,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Validate handler outputs against the action type schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_outputs: Option<bool>,
    /// Emit `<kind>Status` lifecycle events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_events: Option<bool>,
}

impl RouterConfig {
    pub fn validate_outputs(&self) -> bool {
        self.validate_outputs.unwrap_or(true)
    }

    pub fn emit_events(&self) -> bool {
        self.emit_events.unwrap_or(true)
    }

    pub fn with_defaults(mut self) -> Self {
        self.validate_outputs.get_or_insert(true);
        self.emit_events.get_or_insert(true);
        self
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>, // "trace" | "debug" | "info" | "warn" | "error"
    /// Also write JSON lines to a rolling file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
    /// Directory for the rolling log file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}
