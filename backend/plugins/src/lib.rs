pub mod event_bus;
pub mod registry;

pub use event_bus::EventBus;
pub use registry::PluginRegistry;
