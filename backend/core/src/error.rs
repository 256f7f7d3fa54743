use thiserror::Error;

use crate::kind::{Kind, OutputsMode};
use crate::template::TemplateError;

/// Top-level error type for plugin resolution and dispatch.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Unresolved or cyclic plugin dependencies, invalid action type declarations.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("No '{operation}' handler configured for {} type '{action_type}'", .kind.as_str())]
    HandlerNotFound {
        kind: Kind,
        action_type: String,
        operation: String,
    },

    #[error("Error validating {mode} action outputs from {kind} '{action}': key {key} {message}")]
    OutputValidation {
        kind: Kind,
        action: String,
        mode: OutputsMode,
        key: String,
        message: String,
    },

    #[error("invalid {mode} outputs schema for {kind} type '{action_type}': {message}")]
    InvalidSchema {
        kind: Kind,
        action_type: String,
        mode: OutputsMode,
        message: String,
    },

    /// The handler itself failed. `source` is the handler's own error.
    #[error("{operation} handler from plugin '{plugin}' failed for {kind} type '{action_type}': {source}")]
    HandlerExecution {
        kind: Kind,
        action_type: String,
        operation: String,
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to emit {name} event: {source}")]
    EventEmission {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RouterError {
    pub fn config(message: impl Into<String>) -> Self {
        RouterError::Configuration(message.into())
    }

    pub fn is_handler_not_found(&self) -> bool {
        matches!(self, RouterError::HandlerNotFound { .. })
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_not_found_message() {
        let err = RouterError::HandlerNotFound {
            kind: Kind::Build,
            action_type: "test".into(),
            operation: "getOutputs".into(),
        };
        assert_eq!(err.to_string(), "No 'getOutputs' handler configured for build type 'test'");
    }

    #[test]
    fn output_validation_message() {
        let err = RouterError::OutputValidation {
            kind: Kind::Build,
            action: "module-a".into(),
            mode: OutputsMode::Runtime,
            key: ".foo".into(),
            message: "must be a string".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error validating runtime action outputs from Build 'module-a': key .foo must be a string"
        );
    }

    #[test]
    fn execution_error_keeps_source() {
        let err = RouterError::HandlerExecution {
            kind: Kind::Deploy,
            action_type: "container".into(),
            operation: "deploy".into(),
            plugin: "kubernetes".into(),
            source: anyhow::anyhow!("cluster unreachable"),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "cluster unreachable");
        assert!(err.to_string().contains("kubernetes"));
    }
}
