//! Module loading system
//!
//! Ordered registration, restore after restart, and module config files.

pub mod loader;

pub use loader::{ModuleLoader, MODULE_CONFIG_FILE};
