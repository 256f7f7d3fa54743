//! Context handed to handlers as `ctx`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::action::{ActionGraph, ResolvedAction};
use crate::template::{self, TemplateError};

/// Project-wide values shared by every plugin context.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub project_name: String,
    pub environment_name: String,
    /// Project variables with the active environment's variables merged in.
    pub variables: Map<String, Value>,
    /// Provider configuration keyed by plugin name.
    pub provider_configs: HashMap<String, Value>,
}

/// Template and identity context scoped to one plugin and, optionally, one action.
#[derive(Debug, Clone)]
pub struct PluginContext {
    plugin_name: String,
    project: Arc<ProjectContext>,
    action: Option<Arc<ResolvedAction>>,
    graph: Option<Arc<ActionGraph>>,
}

impl PluginContext {
    pub fn new(project: Arc<ProjectContext>, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            project,
            action: None,
            graph: None,
        }
    }

    pub fn with_action(mut self, action: Arc<ResolvedAction>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_graph(mut self, graph: Arc<ActionGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// The same action and project, rescoped to another plugin.
    pub fn for_plugin(&self, plugin_name: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            ..self.clone()
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn project_name(&self) -> &str {
        &self.project.project_name
    }

    pub fn environment_name(&self) -> &str {
        &self.project.environment_name
    }

    pub fn action(&self) -> Option<&Arc<ResolvedAction>> {
        self.action.as_ref()
    }

    /// Configuration of the provider backing the owning plugin, if any.
    pub fn provider_config(&self) -> Option<&Value> {
        self.project.provider_configs.get(&self.plugin_name)
    }

    /// The value tree templates are resolved against.
    pub fn template_context(&self) -> Value {
        let mut root = Map::new();
        root.insert("project".into(), json!({ "name": self.project.project_name }));
        root.insert("environment".into(), json!({ "name": self.project.environment_name }));
        root.insert("var".into(), Value::Object(self.project.variables.clone()));
        root.insert(
            "provider".into(),
            json!({
                "name": self.plugin_name,
                "config": self.provider_config().cloned().unwrap_or_else(|| json!({})),
            }),
        );
        if let Some(action) = &self.action {
            root.insert("action".into(), action.template_value());
        }
        if let Some(graph) = &self.graph {
            root.insert("actions".into(), graph.template_value());
        }
        Value::Object(root)
    }

    pub fn resolve_template_strings(&self, value: &Value) -> Result<Value, TemplateError> {
        template::resolve_template_value(value, &self.template_context())
    }

    pub fn resolve_template_string(&self, s: &str) -> Result<Value, TemplateError> {
        template::resolve_template_string(s, &self.template_context(), "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;

    fn project() -> Arc<ProjectContext> {
        let mut provider_configs = HashMap::new();
        provider_configs.insert("kubernetes".to_string(), json!({ "namespace": "dev" }));
        Arc::new(ProjectContext {
            project_name: "demo".into(),
            environment_name: "local".into(),
            variables: json!({ "replicas": 2 }).as_object().cloned().unwrap(),
            provider_configs,
        })
    }

    #[test]
    fn resolves_project_and_provider_keys() {
        let ctx = PluginContext::new(project(), "kubernetes");
        let v = ctx
            .resolve_template_strings(&json!({
                "ns": "${provider.config.namespace}",
                "name": "${project.name}-${environment.name}",
                "replicas": "${var.replicas}",
            }))
            .unwrap();
        assert_eq!(v, json!({ "ns": "dev", "name": "demo-local", "replicas": 2 }));
    }

    #[test]
    fn rescoping_changes_provider_view() {
        let ctx = PluginContext::new(project(), "kubernetes");
        let other = ctx.for_plugin("container");
        assert_eq!(other.plugin_name(), "container");
        assert!(other.provider_config().is_none());
        assert_eq!(other.resolve_template_string("${provider.name}").unwrap(), json!("container"));
        assert!(other.resolve_template_string("${provider.config.namespace}").is_err());
    }

    #[test]
    fn exposes_action_and_graph() {
        let action = ResolvedAction::new(Kind::Build, "api", "container").with_version("v-7");
        let graph = Arc::new(ActionGraph::from_actions([action.clone()]));
        let ctx = PluginContext::new(project(), "container")
            .with_action(Arc::new(action))
            .with_graph(graph);
        assert_eq!(ctx.resolve_template_string("${action.version}").unwrap(), json!("v-7"));
        assert_eq!(
            ctx.resolve_template_string("${actions.build.api.type}").unwrap(),
            json!("container")
        );
    }
}
