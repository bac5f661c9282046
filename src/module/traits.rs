//! Module system traits and interfaces
//!
//! Defines the contract every feature unit implements and the context the
//! registry hands to its lifecycle hooks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::module::api::events::EventBus;
use crate::module::api::services::ServiceRegistry;
use crate::storage::module_store::ModuleStore;

/// Resolved configuration blob handed to hooks
pub type ModuleConfigMap = serde_json::Map<String, serde_json::Value>;

/// Host requirements declared by a module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRequirements {
    /// Required host core version (informational)
    #[serde(default)]
    pub core: Option<String>,
    /// Required modules (name -> version)
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

/// Module metadata describing module identity and dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name (unique identifier)
    pub name: String,
    /// Module version (semantic versioning, informational)
    pub version: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Module author
    #[serde(default)]
    pub author: String,
    /// Required modules (module names with versions)
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    /// Host and module requirements
    #[serde(default)]
    pub requires: ModuleRequirements,
}

impl ModuleMetadata {
    /// Create metadata with just a name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Builder-style: declare a required module
    pub fn with_dependency(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), version.into());
        self
    }

    /// Names of every module this one requires, from both `dependencies`
    /// and `requires.modules`, sorted and de-duplicated.
    pub fn required_modules(&self) -> BTreeSet<&str> {
        self.dependencies
            .keys()
            .chain(self.requires.modules.keys())
            .map(String::as_str)
            .collect()
    }
}

/// A feature unit managed by the registry
///
/// Every hook defaults to a no-op, so a module that supplies no `install`
/// (for example) is skipped silently at that transition. Hooks receive a
/// context that lives only for the duration of the call; modules that need
/// the event bus or service registry later should clone the `Arc`s out of it.
#[async_trait]
pub trait Module: Send + Sync {
    /// Static descriptor: name, version, dependencies
    fn metadata(&self) -> &ModuleMetadata;

    /// Runs once after the module's record is first persisted
    async fn install(&self, _ctx: &ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on INSTALLED/INACTIVE -> ACTIVE
    async fn activate(&self, _ctx: &ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on ACTIVE -> INACTIVE
    async fn deactivate(&self, _ctx: &ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs before the module's record is deleted
    async fn uninstall(&self, _ctx: &ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Default configuration; `None` means an empty map
    fn default_config(&self) -> Option<ModuleConfigMap> {
        None
    }

    /// Check a resolved configuration before it reaches a hook
    fn validate_config(&self, _config: &ModuleConfigMap) -> bool {
        true
    }
}

/// Context provided to a single lifecycle hook invocation
#[derive(Clone)]
pub struct ModuleContext {
    /// Name of the module the hook belongs to
    pub module_name: String,
    /// Persistence handle
    pub store: Arc<dyn ModuleStore>,
    /// Module configuration (defaults merged with host overrides)
    pub config: ModuleConfigMap,
    /// Shared event bus
    pub events: Arc<EventBus>,
    /// Shared service registry
    pub services: Arc<ServiceRegistry>,
}

impl ModuleContext {
    /// Create a new module context
    pub fn new(
        module_name: impl Into<String>,
        store: Arc<dyn ModuleStore>,
        config: ModuleConfigMap,
        events: Arc<EventBus>,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            store,
            config,
            events,
            services,
        }
    }

    /// Get a string configuration value with default
    pub fn get_config_str_or(&self, key: &str, default: &str) -> String {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_name", &self.module_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Lifecycle hook identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hook {
    Install,
    Activate,
    Deactivate,
    Uninstall,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Install => "install",
            Hook::Activate => "activate",
            Hook::Deactivate => "deactivate",
            Hook::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module {0} is already registered")]
    DuplicateModule(String),

    #[error("Required module {missing} is not installed (required by {module})")]
    Dependency { module: String, missing: String },

    #[error("Module {0} is not registered")]
    NotFound(String),

    #[error("{hook} hook of module {module} failed: {source:#}")]
    HookExecution {
        module: String,
        hook: Hook,
        #[source]
        source: anyhow::Error,
    },

    #[error("Module store failure: {0:#}")]
    Persistence(#[source] anyhow::Error),

    #[error("Invalid module definition: {0}")]
    InvalidDefinition(String),

    #[error("Configuration rejected by module {0}")]
    InvalidConfig(String),

    #[error("Module {0} has no persisted record to restore")]
    NotPersisted(String),
}

impl ModuleError {
    /// Name of the module involved, when the error is about one
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ModuleError::DuplicateModule(name)
            | ModuleError::NotFound(name)
            | ModuleError::InvalidConfig(name)
            | ModuleError::NotPersisted(name) => Some(name),
            ModuleError::Dependency { module, .. } | ModuleError::HookExecution { module, .. } => {
                Some(module)
            }
            ModuleError::Persistence(_) | ModuleError::InvalidDefinition(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_modules_merges_both_maps() {
        let mut metadata = ModuleMetadata::new("shop", "1.0.0").with_dependency("users", "1.0.0");
        metadata
            .requires
            .modules
            .insert("payments".to_string(), "^2.0".to_string());
        metadata
            .requires
            .modules
            .insert("users".to_string(), "1.0.0".to_string());

        let required: Vec<&str> = metadata.required_modules().into_iter().collect();
        assert_eq!(required, vec!["payments", "users"]);
    }

    #[test]
    fn test_hook_error_message_includes_cause() {
        let err = ModuleError::HookExecution {
            module: "blog".to_string(),
            hook: Hook::Activate,
            source: anyhow::anyhow!("database offline"),
        };
        assert_eq!(
            err.to_string(),
            "activate hook of module blog failed: database offline"
        );
        assert_eq!(err.module_name(), Some("blog"));
    }
}
