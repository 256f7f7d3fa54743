//! Action type catalog: every action type per kind, with the handlers each
//! plugin contributes to it.
//!
//! Built once from the ordered plugin list and read-only afterwards.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use trellis_core::{
    ActionHandler, ActionTypeDefinition, BuildOperation, DeployOperation, Kind, Operation,
    Result, RouterError, RunOperation, TestOperation,
};
use trellis_plugins::PluginRegistry;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A handler contributed by one plugin.
#[derive(Clone)]
pub struct HandlerEntry<O: Operation> {
    pub plugin_name: String,
    pub handler: Arc<dyn ActionHandler<O>>,
}

/// A created action type and the handlers registered against it.
#[derive(Clone)]
pub struct ActionTypeEntry<O: Operation> {
    /// The plugin that created the type.
    pub plugin_name: String,
    pub definition: ActionTypeDefinition<O>,
    /// Per operation: the creator's handler first, then extensions in plugin order.
    pub handlers: HashMap<O, Vec<HandlerEntry<O>>>,
}

impl<O: Operation> ActionTypeEntry<O> {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn base(&self) -> Option<&str> {
        self.definition.base.as_deref()
    }

    pub fn handler_chain(&self, operation: O) -> &[HandlerEntry<O>] {
        self.handlers.get(&operation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Operations with at least one handler on this type itself.
    pub fn operations(&self) -> Vec<O> {
        O::all()
            .iter()
            .copied()
            .filter(|op| !self.handler_chain(*op).is_empty())
            .collect()
    }
}

/// Serializable summary of one action type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTypeSummary {
    pub kind: Kind,
    pub name: String,
    pub plugin: String,
    /// Ancestor type names, nearest first.
    pub bases: Vec<String>,
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docs: String,
}

// ---------------------------------------------------------------------------
// Per-kind catalog
// ---------------------------------------------------------------------------

pub struct KindCatalog<O: Operation> {
    types: HashMap<String, ActionTypeEntry<O>>,
    /// Type names in declaration order.
    order: Vec<String>,
}

impl<O: Operation> Default for KindCatalog<O> {
    fn default() -> Self {
        Self { types: HashMap::new(), order: Vec::new() }
    }
}

impl<O: Operation> fmt::Debug for KindCatalog<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindCatalog")
            .field("kind", &O::KIND)
            .field("types", &self.order)
            .finish()
    }
}

impl<O: Operation> KindCatalog<O> {
    pub fn build(registry: &PluginRegistry) -> Result<Self> {
        let mut catalog = Self::default();
        catalog.add_created_types(registry)?;
        catalog.add_extensions(registry)?;
        catalog.check_bases(registry)?;
        debug!(kind = O::KIND.as_str(), types = ?catalog.order, "Built action type catalog");
        Ok(catalog)
    }

    fn add_created_types(&mut self, registry: &PluginRegistry) -> Result<()> {
        for plugin in registry.ordered() {
            for definition in plugin.created::<O>() {
                if let Some(existing) = self.types.get(&definition.name) {
                    return Err(RouterError::config(format!(
                        "{} type '{}' declared by plugin '{}' is already declared by plugin '{}'",
                        O::KIND,
                        definition.name,
                        plugin.name,
                        existing.plugin_name
                    )));
                }
                let handlers = definition
                    .handlers
                    .iter()
                    .map(|(op, handler)| {
                        let entry = HandlerEntry { plugin_name: plugin.name.clone(), handler: handler.clone() };
                        (*op, vec![entry])
                    })
                    .collect();
                self.order.push(definition.name.clone());
                self.types.insert(
                    definition.name.clone(),
                    ActionTypeEntry {
                        plugin_name: plugin.name.clone(),
                        definition: definition.clone(),
                        handlers,
                    },
                );
            }
        }
        Ok(())
    }

    fn add_extensions(&mut self, registry: &PluginRegistry) -> Result<()> {
        for plugin in registry.ordered() {
            for extension in plugin.extended::<O>() {
                let Some(entry) = self.types.get_mut(&extension.name) else {
                    return Err(RouterError::config(format!(
                        "Plugin '{}' extends unknown {} type '{}'",
                        plugin.name,
                        O::KIND.as_str(),
                        extension.name
                    )));
                };
                if !registry.depends_on(&plugin.name, &entry.plugin_name) {
                    return Err(RouterError::config(format!(
                        "Plugin '{}' extends {} type '{}' created by plugin '{}', but does not depend on it",
                        plugin.name,
                        O::KIND.as_str(),
                        extension.name,
                        entry.plugin_name
                    )));
                }
                for op in extension.operations() {
                    if let Some(handler) = extension.handlers.get(&op) {
                        entry.handlers.entry(op).or_default().push(HandlerEntry {
                            plugin_name: plugin.name.clone(),
                            handler: handler.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_bases(&self, registry: &PluginRegistry) -> Result<()> {
        for name in &self.order {
            let entry = &self.types[name];
            let Some(base_name) = entry.base() else { continue };
            let Some(base) = self.types.get(base_name) else {
                return Err(RouterError::config(format!(
                    "{} type '{}' declares unknown base type '{}'",
                    O::KIND,
                    name,
                    base_name
                )));
            };
            if base.plugin_name != entry.plugin_name
                && !registry.depends_on(&entry.plugin_name, &base.plugin_name)
            {
                return Err(RouterError::config(format!(
                    "{} type '{}' from plugin '{}' bases on type '{}' from plugin '{}', which it does not depend on",
                    O::KIND,
                    name,
                    entry.plugin_name,
                    base_name,
                    base.plugin_name
                )));
            }
        }

        for name in &self.order {
            let mut path = vec![name.as_str()];
            let mut current = self.types[name].base();
            while let Some(next) = current {
                if let Some(pos) = path.iter().position(|p| *p == next) {
                    let mut cycle = path.split_off(pos);
                    cycle.push(next);
                    return Err(RouterError::config(format!(
                        "Circular base chain for {} types: {}",
                        O::KIND.as_str(),
                        cycle.join(" -> ")
                    )));
                }
                path.push(next);
                current = self.types.get(next).and_then(|e| e.base());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActionTypeEntry<O>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Ancestors of `name`, nearest first.
    pub fn bases(&self, name: &str) -> Vec<&ActionTypeEntry<O>> {
        let mut bases = Vec::new();
        let mut current = self.get(name).and_then(|e| e.base());
        while let Some(base) = current.and_then(|b| self.get(b)) {
            bases.push(base);
            current = base.base();
        }
        bases
    }

    /// `name` followed by its ancestors.
    pub fn lineage(&self, name: &str) -> Vec<&ActionTypeEntry<O>> {
        self.get(name)
            .into_iter()
            .chain(self.bases(name))
            .collect()
    }

    pub fn describe(&self) -> Vec<ActionTypeSummary> {
        self.order
            .iter()
            .filter_map(|name| self.get(name))
            .map(|entry| ActionTypeSummary {
                kind: O::KIND,
                name: entry.name().to_string(),
                plugin: entry.plugin_name.clone(),
                bases: self.bases(entry.name()).iter().map(|b| b.name().to_string()).collect(),
                operations: entry.operations().iter().map(|op| op.name().to_string()).collect(),
                docs: entry.definition.docs.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Whole catalog
// ---------------------------------------------------------------------------

/// The catalog of every kind, shared between the per-kind routers.
#[derive(Clone)]
pub struct ActionTypeCatalog {
    pub build: Arc<KindCatalog<BuildOperation>>,
    pub deploy: Arc<KindCatalog<DeployOperation>>,
    pub run: Arc<KindCatalog<RunOperation>>,
    pub test: Arc<KindCatalog<TestOperation>>,
}

impl ActionTypeCatalog {
    pub fn new(registry: &PluginRegistry) -> Result<Self> {
        let catalog = Self {
            build: Arc::new(KindCatalog::build(registry)?),
            deploy: Arc::new(KindCatalog::build(registry)?),
            run: Arc::new(KindCatalog::build(registry)?),
            test: Arc::new(KindCatalog::build(registry)?),
        };
        info!(
            plugins = registry.len(),
            build = catalog.build.len(),
            deploy = catalog.deploy.len(),
            run = catalog.run.len(),
            test = catalog.test.len(),
            "Action type catalog ready"
        );
        Ok(catalog)
    }

    pub fn kind<O: CatalogOperation>(&self) -> &Arc<KindCatalog<O>> {
        O::catalog(self)
    }

    /// Ancestor type names of `name` within `kind`, nearest first.
    pub fn bases(&self, kind: Kind, name: &str) -> Vec<String> {
        fn names<O: Operation>(catalog: &KindCatalog<O>, name: &str) -> Vec<String> {
            catalog.bases(name).iter().map(|b| b.name().to_string()).collect()
        }
        match kind {
            Kind::Build => names(&self.build, name),
            Kind::Deploy => names(&self.deploy, name),
            Kind::Run => names(&self.run, name),
            Kind::Test => names(&self.test, name),
            Kind::Provider => Vec::new(),
        }
    }

    pub fn describe(&self) -> Vec<ActionTypeSummary> {
        let mut all = self.build.describe();
        all.extend(self.deploy.describe());
        all.extend(self.run.describe());
        all.extend(self.test.describe());
        all
    }

    /// Names of every action type, across kinds.
    pub fn action_types(&self) -> HashSet<(Kind, String)> {
        self.describe().into_iter().map(|s| (s.kind, s.name)).collect()
    }
}

/// Operation sets that have a catalog.
pub trait CatalogOperation: Operation {
    fn catalog(catalog: &ActionTypeCatalog) -> &Arc<KindCatalog<Self>>;
}

macro_rules! catalog_operation {
    ($($ty:ty => $field:ident),*) => {
        $(
            impl CatalogOperation for $ty {
                fn catalog(catalog: &ActionTypeCatalog) -> &Arc<KindCatalog<Self>> {
                    &catalog.$field
                }
            }
        )*
    };
}

catalog_operation!(
    BuildOperation => build,
    DeployOperation => deploy,
    RunOperation => run,
    TestOperation => test
);
