//! Host bootstrap
//!
//! Builds the storage, event bus, service registry and module registry from a
//! `HostConfig` and hands them out by reference. Nothing here is global: two
//! hosts in one process share no state.

use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::HostConfig;
use crate::module::api::{EventBus, ServiceRegistry};
use crate::module::loader::{ModuleLoader, MODULE_CONFIG_FILE};
use crate::module::registry::{DiscoveredModule, ModuleDiscovery, ModuleRegistry};
use crate::module::traits::ModuleConfigMap;
use crate::storage::{ModuleStatus, Storage};

/// A configured module host
pub struct ModuleHost {
    config: HostConfig,
    storage: Arc<Storage>,
    events: Arc<EventBus>,
    services: Arc<ServiceRegistry>,
    registry: Arc<ModuleRegistry>,
    discovery: ModuleDiscovery,
}

impl ModuleHost {
    /// Open storage and wire up a registry
    ///
    /// Module config overrides come from each discovered module's
    /// `config.toml`, then from `modules.module_configs`, later keys winning.
    pub fn open(config: HostConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let storage = Arc::new(
            Storage::with_preferred_backend(
                &config.storage.data_dir,
                config.storage.backend.into(),
            )
            .with_context(|| format!("opening storage in {}", config.storage.data_dir))?,
        );

        let discovery = ModuleDiscovery::new(&config.modules.modules_dir);
        let discovered = discovery.discover_modules()?;
        let module_configs = Self::module_configs(&config, &discovered)?;

        let events = Arc::new(EventBus::new());
        let services = Arc::new(ServiceRegistry::new());
        let mut registry = ModuleRegistry::new(
            storage.modules(),
            Arc::clone(&events),
            Arc::clone(&services),
        )
        .with_module_configs(module_configs);
        if let Some(timeout) = config.modules.hook_timeout() {
            registry = registry.with_hook_timeout(timeout);
        }

        info!(
            "Module host ready (storage {:?}, modules in {})",
            storage.backend(),
            config.modules.modules_dir
        );

        Ok(Self {
            config,
            storage,
            events,
            services,
            registry: Arc::new(registry),
            discovery,
        })
    }

    fn module_configs(
        config: &HostConfig,
        discovered: &[DiscoveredModule],
    ) -> anyhow::Result<HashMap<String, ModuleConfigMap>> {
        let mut module_configs: HashMap<String, ModuleConfigMap> = HashMap::new();

        for module in discovered {
            let name = &module.manifest.name;
            let file_config =
                ModuleLoader::load_module_config(name, module.directory.join(MODULE_CONFIG_FILE))?;
            if !file_config.is_empty() {
                debug!("Loaded {} config keys for module {}", file_config.len(), name);
                module_configs.insert(name.clone(), file_config);
            }
        }

        for (name, overrides) in &config.modules.module_configs {
            let entry = module_configs.entry(name.clone()).or_default();
            for (key, value) in overrides {
                entry.insert(key.clone(), value.clone());
            }
        }

        Ok(module_configs)
    }

    /// Re-attach every discovered module that has a persisted record
    pub async fn restore_discovered(&self) -> anyhow::Result<Vec<(String, ModuleStatus)>> {
        let discovered = self.discovery.discover_modules()?;
        let restored = ModuleLoader::restore_persisted(
            &self.registry,
            ModuleLoader::from_discovered(&discovered),
        )
        .await?;
        Ok(restored)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn discovery(&self) -> &ModuleDiscovery {
        &self.discovery
    }

    /// Flush storage
    pub fn shutdown(&self) -> anyhow::Result<()> {
        info!("Shutting down module host");
        self.storage.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_merges_config_sources() {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        let blog_dir = modules_dir.join("blog");
        std::fs::create_dir_all(&blog_dir).unwrap();
        std::fs::write(
            blog_dir.join("module.toml"),
            "name = \"blog\"\nversion = \"1.0.0\"\n[config_schema]\nposts_per_page = \"integer\"",
        )
        .unwrap();
        std::fs::write(blog_dir.join(MODULE_CONFIG_FILE), "posts_per_page = 5\ntitle = \"Notes\"")
            .unwrap();

        let mut config = HostConfig::default();
        config.storage.data_dir = temp_dir.path().join("data").display().to_string();
        config.modules.modules_dir = modules_dir.display().to_string();
        config.modules.module_configs.insert(
            "blog".to_string(),
            json!({"posts_per_page": 50}).as_object().cloned().unwrap(),
        );

        let configs = ModuleHost::module_configs(
            &config,
            &ModuleDiscovery::new(&modules_dir).discover_modules().unwrap(),
        )
        .unwrap();
        assert_eq!(configs["blog"]["posts_per_page"], json!(50));
        assert_eq!(configs["blog"]["title"], json!("Notes"));

        let host = ModuleHost::open(config).unwrap();
        assert!(host.restore_discovered().await.unwrap().is_empty());
        host.shutdown().unwrap();
    }
}
