//! Handler traits and the resolved override chain.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use tracing::Span;

use crate::action::{ActionGraph, ResolvedAction};
use crate::context::PluginContext;
use crate::event::EventSink;
use crate::kind::{Operation, ProviderOperation};

/// Plugin name reported for handlers synthesized from a default.
pub const DEFAULT_PLUGIN_NAME: &str = "_default";

/// An implementation of one operation for an action type.
#[async_trait]
pub trait ActionHandler<O: Operation>: Send + Sync {
    async fn handle(&self, params: HandlerParams<O>) -> anyhow::Result<Value>;
}

/// An implementation of one provider-level operation.
#[async_trait]
pub trait ProviderHandler: Send + Sync {
    async fn handle(&self, params: ProviderParams) -> anyhow::Result<Value>;
}

/// Everything a handler receives for one call.
#[derive(Clone)]
pub struct HandlerParams<O: Operation> {
    pub operation: O,
    pub action: Arc<ResolvedAction>,
    /// Operation-specific arguments supplied by the caller.
    pub args: Value,
    pub ctx: PluginContext,
    /// The handler this one overrides or falls back to.
    pub base: Option<Arc<ResolvedHandler<O>>>,
    pub graph: Arc<ActionGraph>,
    pub log: Span,
    pub events: Arc<dyn EventSink>,
}

impl<O: Operation> HandlerParams<O> {
    /// Invoke the overridden handler with a copy of these params.
    pub async fn call_base(&self) -> anyhow::Result<Value> {
        let Some(base) = &self.base else {
            bail!(
                "{} handler from plugin '{}' has no base handler to call",
                self.operation,
                self.ctx.plugin_name()
            );
        };
        base.call(self.clone()).await
    }
}

/// Parameters for provider-level handlers.
#[derive(Debug, Clone)]
pub struct ProviderParams {
    pub operation: ProviderOperation,
    pub ctx: PluginContext,
    pub args: Value,
    pub log: Span,
}

/// A winning handler together with the chain of handlers it overrides.
#[derive(Clone)]
pub struct ResolvedHandler<O: Operation> {
    pub operation: O,
    /// The action type that actually supplied the handler.
    pub action_type: String,
    pub plugin_name: String,
    pub handler: Arc<dyn ActionHandler<O>>,
    pub base: Option<Arc<ResolvedHandler<O>>>,
}

impl<O: Operation> ResolvedHandler<O> {
    pub fn is_default(&self) -> bool {
        self.plugin_name == DEFAULT_PLUGIN_NAME
    }

    /// This handler followed by every handler it overrides, nearest first.
    pub fn chain(&self) -> Vec<&ResolvedHandler<O>> {
        let mut chain = vec![self];
        let mut current = self.base.as_deref();
        while let Some(handler) = current {
            chain.push(handler);
            current = handler.base.as_deref();
        }
        chain
    }

    /// Run this handler. The params are rescoped so that `base` and `ctx`
    /// belong to this link of the chain.
    pub async fn call(&self, mut params: HandlerParams<O>) -> anyhow::Result<Value> {
        params.base = self.base.clone();
        params.ctx = params.ctx.for_plugin(&self.plugin_name);
        self.handler.handle(params).await
    }
}

impl<O: Operation> fmt::Debug for ResolvedHandler<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("operation", &self.operation)
            .field("action_type", &self.action_type)
            .field("plugin_name", &self.plugin_name)
            .field("base", &self.base)
            .finish()
    }
}

/// Adapts an async closure into a handler.
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<O, F, Fut> ActionHandler<O> for FnHandler<F>
where
    O: Operation,
    F: Fn(HandlerParams<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, params: HandlerParams<O>) -> anyhow::Result<Value> {
        (self.f)(params).await
    }
}

#[async_trait]
impl<F, Fut> ProviderHandler for FnHandler<F>
where
    F: Fn(ProviderParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn handle(&self, params: ProviderParams) -> anyhow::Result<Value> {
        (self.f)(params).await
    }
}

/// Build an action handler from an async closure.
pub fn action_handler<O, F, Fut>(f: F) -> Arc<dyn ActionHandler<O>>
where
    O: Operation,
    F: Fn(HandlerParams<O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Build a provider handler from an async closure.
pub fn provider_handler<F, Fut>(f: F) -> Arc<dyn ProviderHandler>
where
    F: Fn(ProviderParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
