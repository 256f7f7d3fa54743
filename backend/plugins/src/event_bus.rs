//! Event Bus
//!
//! Fans router lifecycle events out to any number of subscribers.

use tokio::sync::broadcast;
use tracing::trace;
use trellis_core::{EventSink, RouterEvent};

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast-backed [`EventSink`]. Publishing never blocks; slow subscribers
/// observe `RecvError::Lagged` instead of stalling handlers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { sender: tx }
    }

    /// Dispatches an event to all current subscribers.
    pub fn publish(&self, event: RouterEvent) {
        trace!(event = %event.name, action = %event.payload.action_name, "Publishing router event");
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    /// Provides a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &RouterEvent) -> anyhow::Result<()> {
        self.publish(event.clone());
        Ok(())
    }
}
