//! Plugin declarations: the action types a plugin creates or extends.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::{ActionHandler, ProviderHandler};
use crate::kind::{
    BuildOperation, DeployOperation, Operation, OutputsMode, ProviderOperation, RunOperation,
    TestOperation,
};

/// A dependency on another plugin by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    pub name: String,
    /// A missing optional dependency is ignored instead of rejected.
    #[serde(default)]
    pub optional: bool,
}

impl PluginDependency {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), optional: false }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { name: name.into(), optional: true }
    }
}

/// A new action type created by a plugin.
#[derive(Clone)]
pub struct ActionTypeDefinition<O: Operation> {
    pub name: String,
    pub docs: String,
    /// Another type of the same kind this one refines.
    pub base: Option<String>,
    pub static_outputs_schema: Option<Value>,
    pub runtime_outputs_schema: Option<Value>,
    pub handlers: HashMap<O, Arc<dyn ActionHandler<O>>>,
}

impl<O: Operation> ActionTypeDefinition<O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: String::new(),
            base: None,
            static_outputs_schema: None,
            runtime_outputs_schema: None,
            handlers: HashMap::new(),
        }
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = docs.into();
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_static_outputs_schema(mut self, schema: Value) -> Self {
        self.static_outputs_schema = Some(schema);
        self
    }

    pub fn with_runtime_outputs_schema(mut self, schema: Value) -> Self {
        self.runtime_outputs_schema = Some(schema);
        self
    }

    pub fn with_handler(mut self, operation: O, handler: Arc<dyn ActionHandler<O>>) -> Self {
        self.handlers.insert(operation, handler);
        self
    }

    pub fn outputs_schema(&self, mode: OutputsMode) -> Option<&Value> {
        match mode {
            OutputsMode::Static => self.static_outputs_schema.as_ref(),
            OutputsMode::Runtime => self.runtime_outputs_schema.as_ref(),
        }
    }

    /// Operations this definition implements, in canonical order.
    pub fn operations(&self) -> Vec<O> {
        O::all().iter().copied().filter(|op| self.handlers.contains_key(op)).collect()
    }
}

impl<O: Operation> fmt::Debug for ActionTypeDefinition<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTypeDefinition")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("handlers", &self.operations())
            .finish()
    }
}

/// Handlers a plugin supplies for a type created elsewhere.
#[derive(Clone)]
pub struct ActionTypeExtension<O: Operation> {
    pub name: String,
    pub handlers: HashMap<O, Arc<dyn ActionHandler<O>>>,
}

impl<O: Operation> ActionTypeExtension<O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), handlers: HashMap::new() }
    }

    pub fn with_handler(mut self, operation: O, handler: Arc<dyn ActionHandler<O>>) -> Self {
        self.handlers.insert(operation, handler);
        self
    }

    pub fn operations(&self) -> Vec<O> {
        O::all().iter().copied().filter(|op| self.handlers.contains_key(op)).collect()
    }
}

impl<O: Operation> fmt::Debug for ActionTypeExtension<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTypeExtension")
            .field("name", &self.name)
            .field("handlers", &self.operations())
            .finish()
    }
}

/// Created action types, per kind.
#[derive(Debug, Clone, Default)]
pub struct ActionTypeTables {
    pub build: Vec<ActionTypeDefinition<BuildOperation>>,
    pub deploy: Vec<ActionTypeDefinition<DeployOperation>>,
    pub run: Vec<ActionTypeDefinition<RunOperation>>,
    pub test: Vec<ActionTypeDefinition<TestOperation>>,
}

/// Action type extensions, per kind.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTables {
    pub build: Vec<ActionTypeExtension<BuildOperation>>,
    pub deploy: Vec<ActionTypeExtension<DeployOperation>>,
    pub run: Vec<ActionTypeExtension<RunOperation>>,
    pub test: Vec<ActionTypeExtension<TestOperation>>,
}

/// A loaded plugin. Immutable once handed to the router.
#[derive(Clone, Default)]
pub struct PluginDeclaration {
    pub name: String,
    pub docs: String,
    pub dependencies: Vec<PluginDependency>,
    pub create_action_types: ActionTypeTables,
    pub extend_action_types: ExtensionTables,
    /// Provider-level handlers.
    pub handlers: HashMap<ProviderOperation, Arc<dyn ProviderHandler>>,
}

impl PluginDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = docs.into();
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(PluginDependency::required(name));
        self
    }

    pub fn optionally_depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(PluginDependency::optional(name));
        self
    }

    pub fn create_action_type<O: Operation>(mut self, definition: ActionTypeDefinition<O>) -> Self {
        O::created_mut(&mut self.create_action_types).push(definition);
        self
    }

    pub fn extend_action_type<O: Operation>(mut self, extension: ActionTypeExtension<O>) -> Self {
        O::extended_mut(&mut self.extend_action_types).push(extension);
        self
    }

    pub fn with_provider_handler(
        mut self,
        operation: ProviderOperation,
        handler: Arc<dyn ProviderHandler>,
    ) -> Self {
        self.handlers.insert(operation, handler);
        self
    }

    pub fn created<O: Operation>(&self) -> &[ActionTypeDefinition<O>] {
        O::created(&self.create_action_types)
    }

    pub fn extended<O: Operation>(&self) -> &[ActionTypeExtension<O>] {
        O::extended(&self.extend_action_types)
    }

    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.name.as_str())
    }
}

impl fmt::Debug for PluginDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut provider_ops: Vec<&str> = self.handlers.keys().map(|op| op.name()).collect();
        provider_ops.sort_unstable();
        f.debug_struct("PluginDeclaration")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("create_action_types", &self.create_action_types)
            .field("extend_action_types", &self.extend_action_types)
            .field("handlers", &provider_ops)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{action_handler, HandlerParams};
    use serde_json::json;

    #[test]
    fn builder_routes_definitions_by_kind() {
        let plugin = PluginDeclaration::new("container")
            .create_action_type(
                ActionTypeDefinition::<BuildOperation>::new("container")
                    .with_runtime_outputs_schema(json!({"type": "object"})),
            )
            .create_action_type(ActionTypeDefinition::<DeployOperation>::new("container"))
            .extend_action_type(ActionTypeExtension::<TestOperation>::new("exec"));

        assert_eq!(plugin.created::<BuildOperation>().len(), 1);
        assert_eq!(plugin.created::<DeployOperation>().len(), 1);
        assert!(plugin.created::<RunOperation>().is_empty());
        assert_eq!(plugin.extended::<TestOperation>()[0].name, "exec");
        assert!(plugin.created::<BuildOperation>()[0]
            .outputs_schema(OutputsMode::Runtime)
            .is_some());
        assert!(plugin.created::<BuildOperation>()[0]
            .outputs_schema(OutputsMode::Static)
            .is_none());
    }

    #[test]
    fn operations_are_listed_in_canonical_order() {
        let noop = || {
            action_handler(|_: HandlerParams<BuildOperation>| async { Ok(json!({})) })
        };
        let def = ActionTypeDefinition::new("container")
            .with_handler(BuildOperation::Publish, noop())
            .with_handler(BuildOperation::Build, noop());
        assert_eq!(def.operations(), vec![BuildOperation::Build, BuildOperation::Publish]);
    }

    #[test]
    fn dependencies_keep_optional_flag() {
        let plugin = PluginDeclaration::new("b").depends_on("a").optionally_depends_on("c");
        assert_eq!(plugin.dependency_names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(!plugin.dependencies[0].optional);
        assert!(plugin.dependencies[1].optional);
    }
}
