//! Module loader implementation
//!
//! Drives the registry for batches of definitions: ordered registration,
//! re-attachment after a restart, and per-module config files.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::module::registry::discovery::DiscoveredModule;
use crate::module::registry::manifest::{toml_table_to_config, ManifestModule};
use crate::module::registry::{ModuleDependencies, ModuleRegistry};
use crate::module::traits::{Module, ModuleConfigMap, ModuleError, ModuleMetadata};
use crate::storage::module_store::ModuleStatus;

/// Config file looked for next to a module's manifest
pub const MODULE_CONFIG_FILE: &str = "config.toml";

/// Module loader for registering and restoring batches of modules
pub struct ModuleLoader;

impl ModuleLoader {
    /// Hook-less definitions for discovered manifests
    pub fn from_discovered(discovered: &[DiscoveredModule]) -> Vec<Arc<dyn Module>> {
        discovered
            .iter()
            .map(|d| Arc::new(ManifestModule::new(d.manifest.clone())) as Arc<dyn Module>)
            .collect()
    }

    /// Register all modules in dependency order; returns the order used
    ///
    /// Stops at the first failure; modules registered before it stay registered.
    pub async fn register_in_order(
        registry: &ModuleRegistry,
        modules: Vec<Arc<dyn Module>>,
    ) -> Result<Vec<String>, ModuleError> {
        let load_order = Self::order(&modules, |name| registry.contains(name))?;

        for module_name in &load_order {
            if let Some(module) = Self::take(&modules, module_name) {
                info!("Loading module: {}", module_name);
                registry.register(module).await?;
            }
        }

        Ok(load_order)
    }

    /// Restore every module that has a persisted record and is not yet loaded
    ///
    /// Modules without a record are skipped: they were never installed.
    pub async fn restore_persisted(
        registry: &ModuleRegistry,
        modules: Vec<Arc<dyn Module>>,
    ) -> Result<Vec<(String, ModuleStatus)>, ModuleError> {
        let mut persisted = Vec::new();
        for module in modules {
            let name = module.metadata().name.clone();
            if registry.contains(&name) {
                continue;
            }
            let record = registry
                .store()
                .find_by_name(&name)
                .await
                .map_err(ModuleError::Persistence)?;
            if record.is_some() {
                persisted.push(module);
            } else {
                debug!("Module {} has no persisted record, not restoring", name);
            }
        }

        // Restore does not gate on dependencies; the order only keeps
        // requirements ahead of their dependents.
        let load_order = Self::order(&persisted, |_| true)?;

        let mut restored = Vec::with_capacity(load_order.len());
        for module_name in load_order {
            let Some(module) = Self::take(&persisted, &module_name) else {
                continue;
            };
            for dep in module.metadata().required_modules() {
                if !registry.contains(dep) {
                    warn!("Restored module {} requires {}, which is not installed", module_name, dep);
                }
            }
            let status = registry.restore(module).await?;
            restored.push((module_name, status));
        }

        info!("Restored {} persisted modules", restored.len());
        Ok(restored)
    }

    /// Load module configuration from file
    ///
    /// A missing file is an empty config. TOML is tried first; otherwise the
    /// file is read as `key = value` lines with string values.
    pub fn load_module_config<P: AsRef<Path>>(
        module_name: &str,
        config_path: P,
    ) -> Result<ModuleConfigMap, ModuleError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            debug!("No config file for module {}, using defaults", module_name);
            return Ok(ModuleConfigMap::new());
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            ModuleError::InvalidDefinition(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        if let Ok(table) = contents.parse::<toml::Table>() {
            return toml_table_to_config(table);
        }

        let mut config = ModuleConfigMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                config.insert(
                    key.trim().to_string(),
                    serde_json::Value::String(value.trim().to_string()),
                );
            }
        }

        Ok(config)
    }

    fn order<F>(modules: &[Arc<dyn Module>], already_registered: F) -> Result<Vec<String>, ModuleError>
    where
        F: Fn(&str) -> bool,
    {
        let metadata: Vec<&ModuleMetadata> = modules.iter().map(|m| m.metadata()).collect();
        ModuleDependencies::load_order(&metadata, already_registered)
    }

    fn take(modules: &[Arc<dyn Module>], name: &str) -> Option<Arc<dyn Module>> {
        modules
            .iter()
            .find(|m| m.metadata().name == name)
            .map(Arc::clone)
    }
}
