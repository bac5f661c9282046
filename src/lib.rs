//! press-core - module registry for the Press content-management framework
//!
//! Feature units ("modules") are registered, activated, deactivated and
//! unregistered through a [`ModuleRegistry`]. Their status lives in a
//! persistent module store so it survives restarts. Modules talk to each other
//! through a shared [`EventBus`] and [`ServiceRegistry`], both handed to every
//! lifecycle hook inside a [`ModuleContext`].
//!
//! ## Design Principles
//!
//! 1. **Persisted status is authoritative**: activation checks always re-read the store
//! 2. **Explicit wiring**: [`ModuleHost`] builds every shared object; there are no globals
//! 3. **Optional hooks**: a module implements only the transitions it cares about
//!
//! ```no_run
//! use press_core::{HostConfig, ModuleHost};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let host = ModuleHost::open(HostConfig::default())?;
//! host.restore_discovered().await?;
//! host.registry().activate("blog").await?;
//! host.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod host;
pub mod module;
pub mod storage;
pub mod utils;

pub use config::{DatabaseBackendConfig, HostConfig, LoggingConfig, ModulesConfig, StorageConfig};
pub use host::ModuleHost;
pub use module::api::{Event, EventBus, LifecycleEvent, ServiceError, ServiceRegistry, SubscriptionId};
pub use module::registry::{ManifestModule, ModuleManifest, ModuleRegistry};
pub use module::traits::{
    Hook, Module, ModuleConfigMap, ModuleContext, ModuleError, ModuleMetadata, ModuleRequirements,
};
pub use storage::{AuditEntry, ModuleRecord, ModuleStatus, ModuleStore};
