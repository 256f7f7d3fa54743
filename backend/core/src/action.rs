use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, RouterError};
use crate::kind::Kind;

/// Identifies an action by kind and name, e.g. `build.api`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionReference {
    pub kind: Kind,
    pub name: String,
}

impl ActionReference {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }
}

impl fmt::Display for ActionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.as_str(), self.name)
    }
}

/// An action whose configuration has been resolved by the caller.
///
/// The version is an opaque identifier computed elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAction {
    pub kind: Kind,
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub dependencies: Vec<ActionReference>,
}

impl ResolvedAction {
    pub fn new(kind: Kind, name: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            action_type: action_type.into(),
            version: String::new(),
            spec: json!({}),
            dependencies: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn depends_on(mut self, kind: Kind, name: impl Into<String>) -> Self {
        self.dependencies.push(ActionReference::new(kind, name));
        self
    }

    pub fn reference(&self) -> ActionReference {
        ActionReference::new(self.kind, self.name.clone())
    }

    /// The fields exposed to templates under `action.*`.
    pub fn template_value(&self) -> Value {
        json!({
            "name": self.name,
            "kind": self.kind.to_string(),
            "type": self.action_type,
            "version": self.version,
        })
    }
}

/// Read-only view of the resolved actions in a project.
#[derive(Debug, Clone, Default)]
pub struct ActionGraph {
    actions: HashMap<ActionReference, Arc<ResolvedAction>>,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions(actions: impl IntoIterator<Item = ResolvedAction>) -> Self {
        let mut graph = Self::new();
        for action in actions {
            graph.add(action);
        }
        graph
    }

    /// Insert an action, replacing any previous action with the same reference.
    pub fn add(&mut self, action: ResolvedAction) -> Arc<ResolvedAction> {
        let action = Arc::new(action);
        self.actions.insert(action.reference(), action.clone());
        action
    }

    pub fn get(&self, reference: &ActionReference) -> Option<&Arc<ResolvedAction>> {
        self.actions.get(reference)
    }

    pub fn get_action(&self, kind: Kind, name: &str) -> Option<&Arc<ResolvedAction>> {
        self.get(&ActionReference::new(kind, name))
    }

    /// Resolve the declared dependencies of `action`. A dependency missing
    /// from the graph is a configuration error.
    pub fn dependencies_of(&self, action: &ResolvedAction) -> Result<Vec<Arc<ResolvedAction>>> {
        action
            .dependencies
            .iter()
            .map(|dep| {
                self.get(dep).cloned().ok_or_else(|| {
                    RouterError::config(format!(
                        "{} '{}' depends on {}, which is not in the graph",
                        action.kind, action.name, dep
                    ))
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResolvedAction>> {
        self.actions.values()
    }

    /// Template view: `{ "<kind>": { "<name>": { name, type, version } } }`.
    pub fn template_value(&self) -> Value {
        let mut by_kind = serde_json::Map::new();
        for action in self.actions.values() {
            let entry = by_kind
                .entry(action.kind.as_str().to_string())
                .or_insert_with(|| json!({}));
            if let Value::Object(map) = entry {
                map.insert(
                    action.name.clone(),
                    json!({
                        "name": action.name,
                        "type": action.action_type,
                        "version": action.version,
                    }),
                );
            }
        }
        Value::Object(by_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> ActionGraph {
        ActionGraph::from_actions([
            ResolvedAction::new(Kind::Build, "api", "container").with_version("v-1"),
            ResolvedAction::new(Kind::Deploy, "api", "container")
                .with_version("v-2")
                .depends_on(Kind::Build, "api"),
        ])
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(ActionReference::new(Kind::Build, "api").to_string(), "build.api");
    }

    #[test]
    fn test_dependencies_of() {
        let graph = graph();
        let deploy = graph.get_action(Kind::Deploy, "api").unwrap().clone();
        let deps = graph.dependencies_of(&deploy).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].version, "v-1");
    }

    #[test]
    fn test_missing_dependency_is_config_error() {
        let graph = graph();
        let orphan = ResolvedAction::new(Kind::Test, "unit", "exec").depends_on(Kind::Build, "nope");
        let err = graph.dependencies_of(&orphan).unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert!(err.to_string().contains("build.nope"));
    }

    #[test]
    fn test_template_value() {
        let value = graph().template_value();
        assert_eq!(value["build"]["api"]["version"], "v-1");
        assert_eq!(value["deploy"]["api"]["type"], "container");
    }

    #[test]
    fn test_deserialize_action() {
        let action: ResolvedAction = serde_json::from_value(json!({
            "kind": "Build",
            "name": "api",
            "type": "container",
            "version": "v-9"
        }))
        .unwrap();
        assert_eq!(action.action_type, "container");
        assert!(action.dependencies.is_empty());
    }
}
