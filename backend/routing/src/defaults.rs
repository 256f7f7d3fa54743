//! Built-in handlers used when no plugin implements an optional operation.
//!
//! Operations every type must implement itself (build, deploy, run,
//! getStatus, exec) have none.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use trellis_core::{
    action_handler, ActionHandler, BuildOperation, DeployOperation, HandlerParams, Operation,
    RunOperation, TestOperation,
};

/// Operation sets with built-in fallbacks.
pub trait BuiltinDefaults: Operation {
    fn builtin_default(self) -> Option<Arc<dyn ActionHandler<Self>>>;
}

/// The fallback table for every operation of `O` that has one.
pub fn builtin_defaults<O: BuiltinDefaults>() -> HashMap<O, Arc<dyn ActionHandler<O>>> {
    O::all()
        .iter()
        .filter_map(|op| op.builtin_default().map(|handler| (*op, handler)))
        .collect()
}

/// Passes the action spec through as its configuration.
fn configure<O: Operation>() -> Arc<dyn ActionHandler<O>> {
    action_handler(|params: HandlerParams<O>| async move {
        Ok(json!({ "config": params.action.spec }))
    })
}

fn constant<O: Operation>(value: Value) -> Arc<dyn ActionHandler<O>> {
    action_handler(move |_: HandlerParams<O>| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

fn no_outputs<O: Operation>() -> Arc<dyn ActionHandler<O>> {
    constant(json!({ "outputs": {} }))
}

fn result_unknown<O: Operation>() -> Arc<dyn ActionHandler<O>> {
    constant(json!({ "state": "not-ready", "detail": null, "outputs": {} }))
}

impl BuiltinDefaults for BuildOperation {
    fn builtin_default(self) -> Option<Arc<dyn ActionHandler<Self>>> {
        match self {
            Self::Configure => Some(configure()),
            Self::Validate => Some(constant(json!({}))),
            Self::GetOutputs => Some(no_outputs()),
            Self::Publish => Some(constant(json!({
                "state": "ready",
                "detail": { "published": false },
                "outputs": {}
            }))),
            Self::Build | Self::GetStatus => None,
        }
    }
}

impl BuiltinDefaults for DeployOperation {
    fn builtin_default(self) -> Option<Arc<dyn ActionHandler<Self>>> {
        match self {
            Self::Configure => Some(configure()),
            Self::Validate => Some(constant(json!({}))),
            Self::GetOutputs => Some(no_outputs()),
            Self::Delete => Some(constant(json!({
                "state": "not-ready",
                "detail": { "state": "missing" },
                "outputs": {}
            }))),
            Self::GetLogs | Self::GetPortForward | Self::StopPortForward => Some(constant(json!({}))),
            Self::Deploy | Self::GetStatus | Self::Exec => None,
        }
    }
}

impl BuiltinDefaults for RunOperation {
    fn builtin_default(self) -> Option<Arc<dyn ActionHandler<Self>>> {
        match self {
            Self::Configure => Some(configure()),
            Self::Validate => Some(constant(json!({}))),
            Self::GetOutputs => Some(no_outputs()),
            Self::GetResult => Some(result_unknown()),
            Self::Run => None,
        }
    }
}

impl BuiltinDefaults for TestOperation {
    fn builtin_default(self) -> Option<Arc<dyn ActionHandler<Self>>> {
        match self {
            Self::Configure => Some(configure()),
            Self::Validate => Some(constant(json!({}))),
            Self::GetOutputs => Some(no_outputs()),
            Self::GetResult => Some(result_unknown()),
            Self::Run => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_operations_have_no_default() {
        let build = builtin_defaults::<BuildOperation>();
        assert!(!build.contains_key(&BuildOperation::Build));
        assert!(!build.contains_key(&BuildOperation::GetStatus));
        assert!(build.contains_key(&BuildOperation::Publish));

        let deploy = builtin_defaults::<DeployOperation>();
        assert!(!deploy.contains_key(&DeployOperation::Exec));
        assert_eq!(deploy.len(), 7);

        assert!(!builtin_defaults::<TestOperation>().contains_key(&TestOperation::Run));
        assert_eq!(builtin_defaults::<RunOperation>().len(), 4);
    }
}
