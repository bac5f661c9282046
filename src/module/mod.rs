//! Module system for press-core
//!
//! Modules are feature units that run inside the host process. The registry
//! registers, activates, deactivates and unregisters them, keeping their
//! status in the module store.
//!
//! ## Architecture
//!
//! - **Registry**: sole authority over the set of loaded definitions and their transitions
//! - **Persisted status**: the module store answers "is this module active", never memory
//! - **Event bus**: lifecycle notifications and module-to-module topics
//! - **Service registry**: named capabilities shared between modules
//! - **Hooks**: optional; a hook a module does not provide is skipped

pub mod api;
pub mod loader;
pub mod registry;
pub mod traits;
pub mod validation;

pub use api::{Event, EventBus, LifecycleEvent, ServiceRegistry, SubscriptionId};
pub use loader::ModuleLoader;
pub use registry::{ManifestModule, ModuleDiscovery, ModuleManifest, ModuleRegistry};
pub use traits::{Hook, Module, ModuleConfigMap, ModuleContext, ModuleError, ModuleMetadata};
