use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state reported in action status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionState {
    Unknown,
    GettingStatus,
    Processing,
    Ready,
    Cached,
    NotReady,
    Failed,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

/// Kind-specific status detail, e.g. `{ "state": "building" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatusDetail {
    pub state: String,
}

/// Payload of a `<kind>Status` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatusPayload {
    pub action_name: String,
    pub action_version: String,
    pub operation: String,
    /// Correlates the starting and terminal events of a mutating operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_uid: Option<Uuid>,
    pub state: ActionState,
    pub status: ActionStatusDetail,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// An event published by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterEvent {
    pub name: String,
    pub payload: ActionStatusPayload,
}

impl RouterEvent {
    pub fn is_terminal(&self) -> bool {
        self.payload.completed_at.is_some()
    }
}

/// Receives lifecycle events from the router.
///
/// Implementations must not block on downstream consumers. An `Err` is
/// propagated to the caller of the handler.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RouterEvent) -> anyhow::Result<()>;
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &RouterEvent) -> anyhow::Result<()> {
        Ok(())
    }
}
