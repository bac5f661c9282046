//! Module registry and discovery
//!
//! The lifecycle state machine plus manifest parsing, discovery and
//! dependency ordering.

pub mod dependencies;
pub mod discovery;
pub mod lifecycle;
pub mod manifest;

pub use dependencies::ModuleDependencies;
pub use discovery::{DiscoveredModule, ModuleDiscovery};
pub use lifecycle::ModuleRegistry;
pub use manifest::{ManifestModule, ModuleManifest};
