//! Action router: the per-kind routers and the provider router over one
//! shared catalog.
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use trellis_config::{defaults::DEFAULT_ENVIRONMENT, resolve_variables, TrellisConfig};
use trellis_core::{
    BuildOperation, DeployOperation, EventSink, Kind, Operation, OutputsMode, PluginDeclaration,
    ProjectContext, ResolvedAction, Result, RouterError, RunOperation, TestOperation,
};
use trellis_plugins::PluginRegistry;

use crate::catalog::{ActionTypeCatalog, ActionTypeSummary, KindCatalog};
use crate::defaults::{builtin_defaults, BuiltinDefaults};
use crate::provider::ProviderRouter;
use crate::router::{KindRouter, RouterSettings};

pub struct ActionRouter {
    registry: PluginRegistry,
    catalog: ActionTypeCatalog,
    project: Arc<ProjectContext>,
    build: KindRouter<BuildOperation>,
    deploy: KindRouter<DeployOperation>,
    run: KindRouter<RunOperation>,
    test: KindRouter<TestOperation>,
    provider: ProviderRouter,
}

impl ActionRouter {
    pub fn new(
        plugins: Vec<PluginDeclaration>,
        config: &TrellisConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let registry = PluginRegistry::new(plugins)?;
        let catalog = ActionTypeCatalog::new(&registry)?;
        let project = Arc::new(project_context(config));
        let settings = RouterSettings::from(&config.router_settings());

        let router = Self {
            build: kind_router(&catalog.build, &project, &events, settings),
            deploy: kind_router(&catalog.deploy, &project, &events, settings),
            run: kind_router(&catalog.run, &project, &events, settings),
            test: kind_router(&catalog.test, &project, &events, settings),
            provider: ProviderRouter::new(&registry, project.clone()),
            registry,
            catalog,
            project,
        };
        info!(
            project = %router.project.project_name,
            environment = %router.project.environment_name,
            plugins = ?router.registry.names(),
            "Action router ready"
        );
        Ok(router)
    }

    pub fn build(&self) -> &KindRouter<BuildOperation> {
        &self.build
    }

    pub fn deploy(&self) -> &KindRouter<DeployOperation> {
        &self.deploy
    }

    pub fn run(&self) -> &KindRouter<RunOperation> {
        &self.run
    }

    pub fn test(&self) -> &KindRouter<TestOperation> {
        &self.test
    }

    pub fn provider(&self) -> &ProviderRouter {
        &self.provider
    }

    pub fn catalog(&self) -> &ActionTypeCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn project(&self) -> &Arc<ProjectContext> {
        &self.project
    }

    /// Validate outputs with the router for the action's kind.
    pub fn validate_action_outputs(
        &self,
        action: &ResolvedAction,
        mode: OutputsMode,
        outputs: &Value,
    ) -> Result<()> {
        match action.kind {
            Kind::Build => self.build.validate_action_outputs(action, mode, outputs),
            Kind::Deploy => self.deploy.validate_action_outputs(action, mode, outputs),
            Kind::Run => self.run.validate_action_outputs(action, mode, outputs),
            Kind::Test => self.test.validate_action_outputs(action, mode, outputs),
            Kind::Provider => Err(RouterError::config(format!(
                "Provider action '{}' has no outputs to validate",
                action.name
            ))),
        }
    }

    pub fn describe(&self) -> Vec<ActionTypeSummary> {
        self.catalog.describe()
    }

    /// Action type names of `kind`, in declaration order.
    pub fn action_types(&self, kind: Kind) -> Vec<String> {
        match kind {
            Kind::Build => self.catalog.build.names().to_vec(),
            Kind::Deploy => self.catalog.deploy.names().to_vec(),
            Kind::Run => self.catalog.run.names().to_vec(),
            Kind::Test => self.catalog.test.names().to_vec(),
            Kind::Provider => Vec::new(),
        }
    }
}

fn kind_router<O: Operation + BuiltinDefaults>(
    catalog: &Arc<KindCatalog<O>>,
    project: &Arc<ProjectContext>,
    events: &Arc<dyn EventSink>,
    settings: RouterSettings,
) -> KindRouter<O> {
    KindRouter::new(catalog.clone(), project.clone())
        .with_defaults(builtin_defaults())
        .with_events(events.clone())
        .with_settings(settings)
}

/// Project-wide template values from the loaded config.
pub fn project_context(config: &TrellisConfig) -> ProjectContext {
    ProjectContext {
        project_name: config.project.clone(),
        environment_name: config
            .environment
            .clone()
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        variables: resolve_variables(config),
        provider_configs: config
            .providers
            .iter()
            .map(|p| (p.name.clone(), p.config.clone()))
            .collect(),
    }
}
