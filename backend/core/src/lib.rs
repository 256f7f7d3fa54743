//! `trellis-core`: shared types for the Trellis plugin router.
//!
//! Provides:
//! - Kinds and their closed operation sets
//! - Plugin declarations (created and extended action types)
//! - Resolved actions and the action graph
//! - Handler traits and the resolved override chain
//! - Plugin context with `${...}` template resolution
//! - Lifecycle events and the event sink interface
//! - The router error type

pub mod action;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod kind;
pub mod plugin;
pub mod template;

pub use action::{ActionGraph, ActionReference, ResolvedAction};
pub use context::{PluginContext, ProjectContext};
pub use error::{Result, RouterError};
pub use event::{ActionState, ActionStatusDetail, ActionStatusPayload, EventSink, NoopEventSink, RouterEvent};
pub use handler::{
    action_handler, provider_handler, ActionHandler, FnHandler, HandlerParams, ProviderHandler,
    ProviderParams, ResolvedHandler, DEFAULT_PLUGIN_NAME,
};
pub use kind::{
    BuildOperation, DeployOperation, Kind, Lifecycle, Operation, OutputsCheck, OutputsMode,
    ProviderOperation, RunOperation, StatusTransition, TerminalRule, TestOperation,
};
pub use plugin::{
    ActionTypeDefinition, ActionTypeExtension, ActionTypeTables, ExtensionTables,
    PluginDeclaration, PluginDependency,
};
pub use template::TemplateError;
