//! Router Event Logger
//!
//! Writes every lifecycle event as a structured tracing record.

use tracing::info;
use trellis_core::{EventSink, RouterEvent};

/// Target of the records written by [`TracingEventSink`].
pub const EVENT_TARGET: &str = "router_events";

/// [`EventSink`] that logs events instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &RouterEvent) -> anyhow::Result<()> {
        let payload = &event.payload;
        let uid = payload.action_uid.map(|u| u.to_string()).unwrap_or_default();
        let detail = serde_json::to_string(&payload.status)?;
        info!(
            target: EVENT_TARGET,
            event = %event.name,
            action = %payload.action_name,
            version = %payload.action_version,
            operation = %payload.operation,
            action_uid = %uid,
            state = %payload.state,
            status = %detail,
            terminal = event.is_terminal(),
            "Router event"
        );
        Ok(())
    }
}
