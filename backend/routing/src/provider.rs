//! Provider router: plugin-level operations such as preparing an environment.
//!
//! Provider handlers are keyed by plugin rather than by action type and do
//! not emit lifecycle events.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info_span, Instrument};
use trellis_core::{
    Kind, PluginContext, ProjectContext, ProviderHandler, ProviderOperation, ProviderParams,
    Result, RouterError, DEFAULT_PLUGIN_NAME,
};
use trellis_plugins::PluginRegistry;

/// The handler chosen for a provider operation.
#[derive(Clone)]
pub struct ResolvedProviderHandler {
    pub operation: ProviderOperation,
    /// Owning plugin, or `_default` for a fallback.
    pub plugin_name: String,
    pub handler: Arc<dyn ProviderHandler>,
}

impl fmt::Debug for ResolvedProviderHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProviderHandler")
            .field("operation", &self.operation)
            .field("plugin_name", &self.plugin_name)
            .finish()
    }
}

impl ResolvedProviderHandler {
    pub fn is_default(&self) -> bool {
        self.plugin_name == DEFAULT_PLUGIN_NAME
    }
}

pub struct ProviderRouter {
    handlers: HashMap<String, HashMap<ProviderOperation, Arc<dyn ProviderHandler>>>,
    defaults: HashMap<ProviderOperation, Arc<dyn ProviderHandler>>,
    project: Arc<ProjectContext>,
}

impl ProviderRouter {
    pub fn new(registry: &PluginRegistry, project: Arc<ProjectContext>) -> Self {
        let handlers = registry
            .ordered()
            .iter()
            .map(|plugin| (plugin.name.clone(), plugin.handlers.clone()))
            .collect();
        Self { handlers, defaults: HashMap::new(), project }
    }

    pub fn with_defaults(mut self, defaults: HashMap<ProviderOperation, Arc<dyn ProviderHandler>>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn get_handler(&self, plugin_name: &str, operation: ProviderOperation) -> Result<ResolvedProviderHandler> {
        self.get_handler_with_default(plugin_name, operation, None)
    }

    pub fn get_handler_with_default(
        &self,
        plugin_name: &str,
        operation: ProviderOperation,
        default: Option<Arc<dyn ProviderHandler>>,
    ) -> Result<ResolvedProviderHandler> {
        let Some(own) = self.handlers.get(plugin_name) else {
            return Err(RouterError::config(format!("Plugin '{plugin_name}' is not loaded")));
        };
        if let Some(handler) = own.get(&operation) {
            return Ok(ResolvedProviderHandler {
                operation,
                plugin_name: plugin_name.to_string(),
                handler: handler.clone(),
            });
        }
        match default.or_else(|| self.defaults.get(&operation).cloned()) {
            Some(handler) => {
                debug!(plugin = plugin_name, %operation, "Using default provider handler");
                Ok(ResolvedProviderHandler {
                    operation,
                    plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
                    handler,
                })
            }
            None => Err(RouterError::HandlerNotFound {
                kind: Kind::Provider,
                action_type: plugin_name.to_string(),
                operation: operation.name().to_string(),
            }),
        }
    }

    /// Invoke `operation` for `plugin_name`. The handler's context is always
    /// scoped to the requested plugin, also when a default answers.
    pub async fn call_handler(
        &self,
        plugin_name: &str,
        operation: ProviderOperation,
        args: Value,
    ) -> Result<Value> {
        let resolved = self.get_handler(plugin_name, operation)?;
        let span = info_span!("provider_handler", plugin = plugin_name, %operation, handler = %resolved.plugin_name);
        let params = ProviderParams {
            operation,
            ctx: PluginContext::new(self.project.clone(), plugin_name),
            args,
            log: span.clone(),
        };
        resolved
            .handler
            .handle(params)
            .instrument(span)
            .await
            .map_err(|source| RouterError::HandlerExecution {
                kind: Kind::Provider,
                action_type: plugin_name.to_string(),
                operation: operation.name().to_string(),
                plugin: resolved.plugin_name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{provider_handler, PluginDeclaration};

    fn router() -> ProviderRouter {
        let registry = PluginRegistry::new(vec![
            PluginDeclaration::new("kubernetes").with_provider_handler(
                ProviderOperation::PrepareEnvironment,
                provider_handler(|p: ProviderParams| async move {
                    Ok(json!({ "ready": true, "namespace": p.ctx.provider_config().cloned() }))
                }),
            ),
            PluginDeclaration::new("local"),
        ])
        .unwrap();
        let mut project = ProjectContext::default();
        project.provider_configs.insert("kubernetes".into(), json!({ "namespace": "dev" }));
        ProviderRouter::new(&registry, Arc::new(project))
    }

    #[tokio::test]
    async fn test_calls_plugin_handler_with_its_config() {
        let out = router()
            .call_handler("kubernetes", ProviderOperation::PrepareEnvironment, json!({}))
            .await
            .unwrap();
        assert_eq!(out, json!({ "ready": true, "namespace": { "namespace": "dev" } }));
    }

    #[test]
    fn test_missing_handler_without_default() {
        let err = router()
            .get_handler("local", ProviderOperation::CleanupEnvironment)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No 'cleanupEnvironment' handler configured for provider type 'local'"
        );
    }

    #[tokio::test]
    async fn test_default_answers_for_plugin() {
        let defaults = HashMap::from([(
            ProviderOperation::GetEnvironmentStatus,
            provider_handler(|p: ProviderParams| async move { Ok(json!({ "plugin": p.ctx.plugin_name() })) }),
        )]);
        let router = router().with_defaults(defaults);
        assert!(router
            .get_handler("local", ProviderOperation::GetEnvironmentStatus)
            .unwrap()
            .is_default());
        let out = router
            .call_handler("local", ProviderOperation::GetEnvironmentStatus, json!({}))
            .await
            .unwrap();
        assert_eq!(out["plugin"], "local");
    }

    #[test]
    fn test_unknown_plugin_is_config_error() {
        let err = router().get_handler("nope", ProviderOperation::PrepareEnvironment).unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }
}
