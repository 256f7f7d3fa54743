mod common;

use common::*;
use serde_json::json;
use trellis_core::{
    action_handler, ActionTypeDefinition, BuildOperation, HandlerParams, PluginDeclaration,
    RouterError, DEFAULT_PLUGIN_NAME,
};

#[test]
fn test_no_handler_and_no_default_is_not_found() {
    let router = build_router(vec![
        PluginDeclaration::new("a").create_action_type(ActionTypeDefinition::<BuildOperation>::new("test")),
    ]);
    let err = router.get_handler(BuildOperation::GetOutputs, "test").unwrap_err();
    match &err {
        RouterError::HandlerNotFound { operation, action_type, .. } => {
            assert_eq!(operation, "getOutputs");
            assert_eq!(action_type, "test");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.to_string(), "No 'getOutputs' handler configured for build type 'test'");
}

#[test]
fn test_extension_overrides_creator() {
    let router = build_router(vec![creates("a", "test"), extends("b", "test", &["a"])]);
    let handler = router.get_handler(BuildOperation::Build, "test").unwrap();
    assert_eq!(handler.plugin_name, "b");
    assert_eq!(handler.action_type, "test");
    let base = handler.base.as_ref().unwrap();
    assert_eq!(base.plugin_name, "a");
    assert!(base.base.is_none());
}

#[test]
fn test_three_level_override_chain() {
    let router = build_router(vec![
        extends("c", "test", &["b"]),
        extends("b", "test", &["a"]),
        creates("a", "test"),
    ]);
    assert_eq!(chain_plugins(&router, "test"), vec!["c", "b", "a"]);
}

#[test]
fn test_later_sibling_wins() {
    let router = build_router(vec![
        creates("a", "test"),
        extends("b1", "test", &["a"]),
        extends("b2", "test", &["a"]),
    ]);
    assert_eq!(chain_plugins(&router, "test"), vec!["b2", "b1", "a"]);

    let router = build_router(vec![
        creates("a", "test"),
        extends("b2", "test", &["a"]),
        extends("b1", "test", &["a"]),
    ]);
    assert_eq!(chain_plugins(&router, "test"), vec!["b1", "b2", "a"]);
}

#[test]
fn test_extension_without_handler_for_operation_is_skipped() {
    let router = build_router(vec![
        creates("a", "test"),
        extends("b", "test", &["a"]),
        PluginDeclaration::new("c")
            .depends_on("b")
            .extend_action_type(trellis_core::ActionTypeExtension::<BuildOperation>::new("test")),
    ]);
    assert_eq!(chain_plugins(&router, "test"), vec!["b", "a"]);
}

fn multi_level_plugins() -> Vec<PluginDeclaration> {
    vec![
        creates("base", "base"),
        PluginDeclaration::new("base-2")
            .depends_on("base")
            .create_action_type(ActionTypeDefinition::<BuildOperation>::new("base-2").with_base("base")),
        PluginDeclaration::new("plugin2")
            .depends_on("base-2")
            .create_action_type(ActionTypeDefinition::<BuildOperation>::new("ext").with_base("base-2")),
    ]
}

#[test]
fn test_multi_level_base_fallback() {
    let router = build_router(multi_level_plugins());
    let handler = router.get_handler(BuildOperation::Build, "ext").unwrap();
    assert_eq!(handler.plugin_name, "base");
    assert_eq!(handler.operation, BuildOperation::Build);
    assert_eq!(handler.action_type, "base");
    assert!(handler.base.is_none());
}

#[test]
fn test_base_fallback_keeps_ancestor_overrides() {
    let mut plugins = multi_level_plugins();
    plugins.push(extends("tweaks", "base", &["base"]));
    let router = build_router(plugins);
    assert_eq!(chain_plugins(&router, "ext"), vec!["tweaks", "base"]);
}

#[test]
fn test_own_handler_beats_base_type() {
    let mut plugins = multi_level_plugins();
    plugins.push(extends("ext-impl", "ext", &["plugin2"]));
    let router = build_router(plugins);
    let handler = router.get_handler(BuildOperation::Build, "ext").unwrap();
    assert_eq!(handler.plugin_name, "ext-impl");
    assert_eq!(handler.action_type, "ext");
    assert!(handler.base.is_none());
}

#[test]
fn test_default_is_synthesized_for_requested_type() {
    let router = build_router(multi_level_plugins());
    let default = action_handler(|_: HandlerParams<BuildOperation>| async { Ok(json!({})) });
    let handler = router
        .get_handler_with_default(BuildOperation::Publish, "ext", Some(default))
        .unwrap();
    assert_eq!(handler.plugin_name, DEFAULT_PLUGIN_NAME);
    assert_eq!(handler.action_type, "ext");
    assert!(handler.base.is_none());
}

#[test]
fn test_get_handler_is_idempotent() {
    let router = build_router(vec![
        creates("a", "test"),
        extends("b1", "test", &["a"]),
        extends("b2", "test", &["a"]),
    ]);
    let first = chain_plugins(&router, "test");
    for _ in 0..5 {
        assert_eq!(chain_plugins(&router, "test"), first);
    }
    let a = router.get_handler(BuildOperation::Build, "test").unwrap();
    let b = router.get_handler(BuildOperation::Build, "test").unwrap();
    assert_eq!(a.action_type, b.action_type);
    assert_eq!(a.plugin_name, b.plugin_name);
}
