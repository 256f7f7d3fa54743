//! `trellis-routing`: handler resolution and dispatch for Trellis plugins.
//!
//! Provides:
//! - The action type catalog built from the ordered plugin list
//! - Per-kind routers: handler resolution, invocation and lifecycle events
//! - Output validation against inherited schemas
//! - Built-in default handlers
//! - The provider router and the action router facade

pub mod action_router;
pub mod catalog;
pub mod defaults;
pub mod provider;
pub mod router;
pub mod validator;

pub use action_router::{project_context, ActionRouter};
pub use catalog::{ActionTypeCatalog, ActionTypeEntry, ActionTypeSummary, CatalogOperation, HandlerEntry, KindCatalog};
pub use defaults::{builtin_defaults, BuiltinDefaults};
pub use provider::{ProviderRouter, ResolvedProviderHandler};
pub use router::{HandlerOutcome, HandlerRequest, KindRouter, RouterSettings};
pub use validator::{effective_schema, merge_schemas, validate_outputs};
