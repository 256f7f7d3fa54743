#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use trellis_core::{
    action_handler, ActionHandler, ActionTypeDefinition, ActionTypeExtension, BuildOperation,
    HandlerParams, PluginDeclaration, ProjectContext,
};
use trellis_plugins::PluginRegistry;
use trellis_routing::{KindCatalog, KindRouter};

/// A build handler that reports which plugin answered.
pub fn reporting(plugin: &'static str) -> Arc<dyn ActionHandler<BuildOperation>> {
    action_handler(move |_: HandlerParams<BuildOperation>| async move { Ok(json!({ "plugin": plugin })) })
}

/// A build handler that returns `value` unchanged.
pub fn returning(value: Value) -> Arc<dyn ActionHandler<BuildOperation>> {
    action_handler(move |_: HandlerParams<BuildOperation>| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

pub fn creates(plugin: &'static str, action_type: &str) -> PluginDeclaration {
    PluginDeclaration::new(plugin).create_action_type(
        ActionTypeDefinition::<BuildOperation>::new(action_type).with_handler(BuildOperation::Build, reporting(plugin)),
    )
}

pub fn extends(plugin: &'static str, action_type: &str, deps: &[&str]) -> PluginDeclaration {
    deps.iter()
        .fold(PluginDeclaration::new(plugin), |p, dep| p.depends_on(*dep))
        .extend_action_type(
            ActionTypeExtension::<BuildOperation>::new(action_type)
                .with_handler(BuildOperation::Build, reporting(plugin)),
        )
}

pub fn build_router(plugins: Vec<PluginDeclaration>) -> KindRouter<BuildOperation> {
    let registry = PluginRegistry::new(plugins).expect("valid plugins");
    let catalog = KindCatalog::build(&registry).expect("valid catalog");
    KindRouter::new(Arc::new(catalog), Arc::new(ProjectContext::default()))
}

/// Plugin names along the resolved chain, winner first.
pub fn chain_plugins(router: &KindRouter<BuildOperation>, action_type: &str) -> Vec<String> {
    router
        .get_handler(BuildOperation::Build, action_type)
        .expect("handler")
        .chain()
        .iter()
        .map(|h| h.plugin_name.clone())
        .collect()
}
