//! Shared capabilities handed to modules: the event bus and the service registry

pub mod events;
pub mod services;

pub use events::{Event, EventBus, LifecycleEvent, Listener, SubscriptionId};
pub use services::{ServiceError, ServiceRegistry};
