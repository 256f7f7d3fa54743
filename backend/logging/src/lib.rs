//! Structured logging components for Trellis.
//!
//! Handles console and JSON file output, environment-based level control,
//! and logging of router lifecycle events.

pub mod event_logger;
pub mod logger;

pub use event_logger::{TracingEventSink, EVENT_TARGET};
pub use logger::{init_logger, LOG_FILE_PREFIX};
