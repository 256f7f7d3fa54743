//! Per-kind router: resolves the handler for an operation on an action type,
//! invokes it, validates its outputs and reports lifecycle events.
//!
//! Resolution order for `(operation, type)`:
//! 1. the type's own chain: creator first, then extensions in plugin order,
//!    the last one winning with each earlier one as its `base`;
//! 2. if that chain is empty, the same lookup on the type's `base`, repeated
//!    up the base chain, returned as found (naming the ancestor type);
//! 3. a supplied default, reported as plugin `_default` for the requested type;
//! 4. otherwise `HandlerNotFound`.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, info_span, Instrument};
use trellis_core::{
    ActionGraph, ActionHandler, ActionStatusDetail, ActionStatusPayload, EventSink,
    HandlerParams, NoopEventSink, Operation, OutputsMode, PluginContext, ProjectContext,
    ResolvedAction, ResolvedHandler, Result, RouterError, RouterEvent, StatusTransition,
    DEFAULT_PLUGIN_NAME,
};
use uuid::Uuid;

use crate::catalog::{HandlerEntry, KindCatalog};
use crate::validator;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Switches for the optional parts of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    pub validate_outputs: bool,
    pub emit_events: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self { validate_outputs: true, emit_events: true }
    }
}

impl From<&trellis_config::RouterConfig> for RouterSettings {
    fn from(config: &trellis_config::RouterConfig) -> Self {
        Self {
            validate_outputs: config.validate_outputs(),
            emit_events: config.emit_events(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One `call_handler` invocation.
pub struct HandlerRequest<O: Operation> {
    pub operation: O,
    pub action: Arc<ResolvedAction>,
    pub args: Value,
    pub graph: Arc<ActionGraph>,
    /// Overrides the router's sink for this call.
    pub events: Option<Arc<dyn EventSink>>,
    /// Takes precedence over the router's default table.
    pub default: Option<Arc<dyn ActionHandler<O>>>,
}

impl<O: Operation> HandlerRequest<O> {
    pub fn new(operation: O, action: impl Into<Arc<ResolvedAction>>) -> Self {
        Self {
            operation,
            action: action.into(),
            args: json!({}),
            graph: Arc::new(ActionGraph::new()),
            events: None,
            default: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_graph(mut self, graph: Arc<ActionGraph>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_default(mut self, handler: Arc<dyn ActionHandler<O>>) -> Self {
        self.default = Some(handler);
        self
    }
}

/// What a successful call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub result: Value,
    /// Plugin of the winning handler (`_default` for fallbacks).
    pub plugin_name: String,
    /// The type that actually supplied the handler.
    pub action_type: String,
    /// Correlation id of the emitted events, for mutating operations.
    pub action_uid: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct KindRouter<O: Operation> {
    catalog: Arc<KindCatalog<O>>,
    project: Arc<ProjectContext>,
    defaults: HashMap<O, Arc<dyn ActionHandler<O>>>,
    events: Arc<dyn EventSink>,
    settings: RouterSettings,
}

impl<O: Operation> KindRouter<O> {
    pub fn new(catalog: Arc<KindCatalog<O>>, project: Arc<ProjectContext>) -> Self {
        Self {
            catalog,
            project,
            defaults: HashMap::new(),
            events: Arc::new(NoopEventSink),
            settings: RouterSettings::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: HashMap<O, Arc<dyn ActionHandler<O>>>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &Arc<KindCatalog<O>> {
        &self.catalog
    }

    /// Resolve the handler for `operation` on `action_type`, falling back to
    /// the router's default table.
    pub fn get_handler(&self, operation: O, action_type: &str) -> Result<ResolvedHandler<O>> {
        self.get_handler_with_default(operation, action_type, None)
    }

    /// Like [`get_handler`](Self::get_handler), with a per-call default that
    /// wins over the router's table.
    pub fn get_handler_with_default(
        &self,
        operation: O,
        action_type: &str,
        default: Option<Arc<dyn ActionHandler<O>>>,
    ) -> Result<ResolvedHandler<O>> {
        if self.catalog.contains(action_type) {
            if let Some(resolved) = self.resolve(operation, action_type) {
                debug!(
                    kind = O::KIND.as_str(),
                    %operation,
                    action_type,
                    plugin = %resolved.plugin_name,
                    via = %resolved.action_type,
                    "Resolved handler"
                );
                return Ok(resolved);
            }
            if let Some(handler) = default.or_else(|| self.defaults.get(&operation).cloned()) {
                debug!(kind = O::KIND.as_str(), %operation, action_type, "Using default handler");
                return Ok(ResolvedHandler {
                    operation,
                    action_type: action_type.to_string(),
                    plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
                    handler,
                    base: None,
                });
            }
        }
        Err(RouterError::HandlerNotFound {
            kind: O::KIND,
            action_type: action_type.to_string(),
            operation: operation.name().to_string(),
        })
    }

    fn resolve(&self, operation: O, action_type: &str) -> Option<ResolvedHandler<O>> {
        self.catalog
            .lineage(action_type)
            .into_iter()
            .find_map(|entry| link_chain(operation, entry.name(), entry.handler_chain(operation)))
    }

    /// Resolve and invoke the handler for `request`, validating its outputs
    /// and emitting lifecycle events around it. With a non-empty graph, every
    /// declared dependency of the action must be present in it.
    pub async fn call_handler(&self, request: HandlerRequest<O>) -> Result<HandlerOutcome> {
        let HandlerRequest { operation, action, args, graph, events, default } = request;

        if action.kind != O::KIND {
            return Err(RouterError::config(format!(
                "Cannot call {} operation '{}' on {} action '{}'",
                O::KIND.as_str(),
                operation,
                action.kind.as_str(),
                action.name
            )));
        }

        let handler = self.get_handler_with_default(operation, &action.action_type, default)?;
        let dependencies = if graph.is_empty() { Vec::new() } else { graph.dependencies_of(&action)? };
        let events = events.unwrap_or_else(|| self.events.clone());
        let lifecycle = operation.lifecycle();
        let action_uid = lifecycle.filter(|l| l.mutating).map(|_| Uuid::new_v4());
        let started_at = Utc::now();

        let span = info_span!(
            "handler",
            kind = O::KIND.as_str(),
            %operation,
            action = %action.name,
            action_type = %action.action_type,
            plugin = %handler.plugin_name,
            dependencies = dependencies.len(),
        );

        if let Some(lifecycle) = lifecycle {
            let event = status_event::<O>(&action, operation, action_uid, lifecycle.starting, started_at, None);
            self.emit(events.as_ref(), &event)?;
        }

        let ctx = PluginContext::new(self.project.clone(), handler.plugin_name.clone())
            .with_action(action.clone())
            .with_graph(graph.clone());
        let params = HandlerParams {
            operation,
            action: action.clone(),
            args,
            ctx,
            base: None,
            graph,
            log: span.clone(),
            events: events.clone(),
        };

        let result = handler
            .call(params)
            .instrument(span.clone())
            .await
            .map_err(|source| RouterError::HandlerExecution {
                kind: O::KIND,
                action_type: action.action_type.clone(),
                operation: operation.name().to_string(),
                plugin: handler.plugin_name.clone(),
                source,
            })?;

        if let Some(check) = operation.outputs_check() {
            let ready = result.get("state").and_then(Value::as_str) == Some("ready");
            if self.settings.validate_outputs && (!check.only_when_ready || ready) {
                let outputs = result.get("outputs").cloned().unwrap_or_else(|| json!({}));
                self.validate_action_outputs(&action, check.mode, &outputs)?;
            }
        }

        if let Some(lifecycle) = lifecycle {
            let terminal = lifecycle.terminal.resolve(&result);
            let event = status_event::<O>(&action, operation, action_uid, terminal, started_at, Some(Utc::now()));
            self.emit(events.as_ref(), &event)?;
        }

        span.in_scope(|| info!("Handler completed"));
        Ok(HandlerOutcome {
            result,
            plugin_name: handler.plugin_name,
            action_type: handler.action_type,
            action_uid,
        })
    }

    /// Validate outputs of `action` against its type's effective schema.
    pub fn validate_action_outputs(
        &self,
        action: &ResolvedAction,
        mode: OutputsMode,
        outputs: &Value,
    ) -> Result<()> {
        validator::validate_outputs(&self.catalog, &action.action_type, &action.name, mode, outputs)
    }

    fn emit(&self, sink: &dyn EventSink, event: &RouterEvent) -> Result<()> {
        if !self.settings.emit_events {
            return Ok(());
        }
        sink.emit(event).map_err(|source| RouterError::EventEmission {
            name: event.name.clone(),
            source,
        })
    }
}

/// Link a type's handler chain so that each entry overrides the one before it.
fn link_chain<O: Operation>(
    operation: O,
    action_type: &str,
    chain: &[HandlerEntry<O>],
) -> Option<ResolvedHandler<O>> {
    chain.iter().fold(None, |base, entry| {
        Some(ResolvedHandler {
            operation,
            action_type: action_type.to_string(),
            plugin_name: entry.plugin_name.clone(),
            handler: entry.handler.clone(),
            base: base.map(Arc::new),
        })
    })
}

fn status_event<O: Operation>(
    action: &ResolvedAction,
    operation: O,
    action_uid: Option<Uuid>,
    transition: StatusTransition,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) -> RouterEvent {
    RouterEvent {
        name: O::KIND.status_event_name(),
        payload: ActionStatusPayload {
            action_name: action.name.clone(),
            action_version: action.version.clone(),
            operation: operation.name().to_string(),
            action_uid,
            state: transition.state,
            status: ActionStatusDetail { state: transition.detail.to_string() },
            started_at,
            completed_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{action_handler, ActionTypeDefinition, BuildOperation, Kind, PluginDeclaration};
    use trellis_plugins::PluginRegistry;

    fn router() -> KindRouter<BuildOperation> {
        let registry = PluginRegistry::new(vec![PluginDeclaration::new("container").create_action_type(
            ActionTypeDefinition::new("container").with_handler(
                BuildOperation::Build,
                action_handler(|p: HandlerParams<BuildOperation>| async move {
                    Ok(json!({ "plugin": p.ctx.plugin_name(), "outputs": {} }))
                }),
            ),
        )])
        .unwrap();
        let catalog = Arc::new(KindCatalog::build(&registry).unwrap());
        KindRouter::new(catalog, Arc::new(ProjectContext::default()))
    }

    #[test]
    fn unknown_type_is_not_found_even_with_default() {
        let default = action_handler(|_: HandlerParams<BuildOperation>| async { Ok(json!({})) });
        let err = router()
            .get_handler_with_default(BuildOperation::Build, "ghost", Some(default))
            .unwrap_err();
        assert!(err.is_handler_not_found());
    }

    #[test]
    fn per_call_default_beats_table() {
        let table = HashMap::from([(
            BuildOperation::Publish,
            action_handler(|_: HandlerParams<BuildOperation>| async { Ok(json!({ "from": "table" })) }),
        )]);
        let router = router().with_defaults(table);
        assert!(router.get_handler(BuildOperation::Publish, "container").unwrap().is_default());

        let per_call = action_handler(|_: HandlerParams<BuildOperation>| async { Ok(json!({ "from": "call" })) });
        let resolved = router
            .get_handler_with_default(BuildOperation::Publish, "container", Some(per_call))
            .unwrap();
        assert_eq!(resolved.plugin_name, DEFAULT_PLUGIN_NAME);
        assert_eq!(resolved.action_type, "container");
        assert!(resolved.base.is_none());
    }

    #[tokio::test]
    async fn kind_mismatch_is_rejected() {
        let action = ResolvedAction::new(Kind::Deploy, "api", "container");
        let err = router()
            .call_handler(HandlerRequest::new(BuildOperation::Build, action))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }

    #[tokio::test]
    async fn mutating_call_gets_uid() {
        let action = ResolvedAction::new(Kind::Build, "api", "container");
        let outcome = router()
            .call_handler(HandlerRequest::new(BuildOperation::Build, action))
            .await
            .unwrap();
        assert_eq!(outcome.result["plugin"], "container");
        assert!(outcome.action_uid.is_some());
    }
}
