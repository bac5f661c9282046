//! Module registry: the lifecycle state machine
//!
//! ```text
//! (absent) --register--> INSTALLED --activate--> ACTIVE
//! ACTIVE --deactivate--> INACTIVE --activate--> ACTIVE
//! any --unregister--> (absent)   (deactivates first when ACTIVE)
//! ```
//!
//! The registry owns the in-memory set of definitions. It never keeps a status
//! flag of its own: every activation decision re-reads the module store.
//! Callers serialize operations on the same module name; operations on
//! different names may run concurrently.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::module::api::events::{EventBus, LifecycleEvent};
use crate::module::api::services::ServiceRegistry;
use crate::module::registry::dependencies::ModuleDependencies;
use crate::module::traits::{Hook, Module, ModuleConfigMap, ModuleContext, ModuleError};
use crate::module::validation::{DefinitionValidator, ValidationResult};
use crate::storage::module_store::{ModuleStatus, ModuleStore};
use crate::utils::with_optional_timeout;

/// Registry of loaded module definitions
pub struct ModuleRegistry {
    /// Registered definitions by name
    modules: RwLock<BTreeMap<String, Arc<dyn Module>>>,
    /// Persisted status, the source of truth for activation
    store: Arc<dyn ModuleStore>,
    events: Arc<EventBus>,
    services: Arc<ServiceRegistry>,
    validator: DefinitionValidator,
    /// Host overrides layered over each module's default config
    module_configs: HashMap<String, ModuleConfigMap>,
    /// Deadline applied to every hook, if any
    hook_timeout: Option<Duration>,
}

impl ModuleRegistry {
    /// Create an empty registry over the given store, bus and service registry
    pub fn new(
        store: Arc<dyn ModuleStore>,
        events: Arc<EventBus>,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            modules: RwLock::new(BTreeMap::new()),
            store,
            events,
            services,
            validator: DefinitionValidator::new(),
            module_configs: HashMap::new(),
            hook_timeout: None,
        }
    }

    /// Run every hook under `timeout`; expiry counts as a hook failure
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = Some(timeout);
        self
    }

    /// Host configuration overrides, keyed by module name
    pub fn with_module_configs(mut self, module_configs: HashMap<String, ModuleConfigMap>) -> Self {
        self.module_configs = module_configs;
        self
    }

    /// Register a definition
    ///
    /// The record is persisted as INSTALLED before the definition enters
    /// memory, so a store failure leaves nothing behind. The install hook runs
    /// after both; if it fails the module stays registered (INSTALLED) and no
    /// `registered` event is published.
    pub async fn register(&self, module: Arc<dyn Module>) -> Result<(), ModuleError> {
        let metadata = module.metadata();
        let name = metadata.name.clone();

        if let ValidationResult::Invalid(errors) = self.validator.validate(metadata) {
            return Err(ModuleError::InvalidDefinition(errors.join("; ")));
        }

        {
            let modules = self.modules.read();
            if modules.contains_key(&name) {
                return Err(ModuleError::DuplicateModule(name));
            }
            ModuleDependencies::validate(metadata, |dep| modules.contains_key(dep))?;
        }

        let config = self.resolve_config(module.as_ref())?;

        self.store
            .upsert(&name, &metadata.version, ModuleStatus::Installed)
            .await
            .map_err(ModuleError::Persistence)?;

        self.modules.write().insert(name.clone(), Arc::clone(&module));
        info!("Registered module {} v{}", name, metadata.version);

        self.run_hook(&module, Hook::Install, config).await?;

        self.events.publish_lifecycle(&LifecycleEvent::Registered {
            name,
            version: metadata.version.clone(),
        });
        Ok(())
    }

    /// Remove a module, deactivating it first if it is ACTIVE
    ///
    /// If either hook fails the module stays fully registered. The config is
    /// not validated here, so a module can always be taken down.
    pub async fn unregister(&self, name: &str) -> Result<(), ModuleError> {
        let module = self.lookup(name)?;

        if self.persisted_status(name).await? == Some(ModuleStatus::Active) {
            self.deactivate(name).await?;
        }

        let config = self.merged_config(module.as_ref());
        self.run_hook(&module, Hook::Uninstall, config).await?;

        self.store
            .delete(name)
            .await
            .map_err(ModuleError::Persistence)?;
        self.modules.write().remove(name);
        info!("Unregistered module {}", name);

        let dependents = self.dependents_of(name);
        if !dependents.is_empty() {
            warn!(
                "Module {} was unregistered while still required by: {}",
                name,
                dependents.join(", ")
            );
        }

        self.events.publish_lifecycle(&LifecycleEvent::Unregistered {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Transition to ACTIVE; a no-op if the persisted status already is
    pub async fn activate(&self, name: &str) -> Result<(), ModuleError> {
        let module = self.lookup(name)?;

        if self.persisted_status(name).await? == Some(ModuleStatus::Active) {
            debug!("Module {} is already active", name);
            return Ok(());
        }

        let config = self.resolve_config(module.as_ref())?;
        self.run_hook(&module, Hook::Activate, config).await?;

        self.store
            .update_status(name, ModuleStatus::Active)
            .await
            .map_err(ModuleError::Persistence)?;
        info!("Activated module {}", name);

        self.events.publish_lifecycle(&LifecycleEvent::Activated {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Transition ACTIVE to INACTIVE; a no-op for any other persisted status
    pub async fn deactivate(&self, name: &str) -> Result<(), ModuleError> {
        let module = self.lookup(name)?;

        if self.persisted_status(name).await? != Some(ModuleStatus::Active) {
            debug!("Module {} is not active", name);
            return Ok(());
        }

        let config = self.merged_config(module.as_ref());
        self.run_hook(&module, Hook::Deactivate, config).await?;

        self.store
            .update_status(name, ModuleStatus::Inactive)
            .await
            .map_err(ModuleError::Persistence)?;
        info!("Deactivated module {}", name);

        self.events.publish_lifecycle(&LifecycleEvent::Deactivated {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Re-attach a definition to its persisted record after a restart
    ///
    /// Runs no hooks, writes nothing and publishes nothing. Returns the
    /// persisted status.
    pub async fn restore(&self, module: Arc<dyn Module>) -> Result<ModuleStatus, ModuleError> {
        let metadata = module.metadata();
        let name = metadata.name.clone();

        if let ValidationResult::Invalid(errors) = self.validator.validate(metadata) {
            return Err(ModuleError::InvalidDefinition(errors.join("; ")));
        }
        if self.contains(&name) {
            return Err(ModuleError::DuplicateModule(name));
        }

        let record = self
            .store
            .find_by_name(&name)
            .await
            .map_err(ModuleError::Persistence)?
            .ok_or_else(|| ModuleError::NotPersisted(name.clone()))?;

        if record.version != metadata.version {
            warn!(
                "Module {} was persisted at v{} but restored at v{}",
                name, record.version, metadata.version
            );
        }

        let mut modules = self.modules.write();
        if modules.contains_key(&name) {
            return Err(ModuleError::DuplicateModule(name));
        }
        modules.insert(name.clone(), module);
        debug!("Restored module {} ({})", name, record.status);
        Ok(record.status)
    }

    /// Registered definition for `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.read().get(name).cloned()
    }

    /// All registered definitions, ordered by name
    pub fn list(&self) -> Vec<Arc<dyn Module>> {
        self.modules.read().values().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Whether the persisted record says ACTIVE; false when there is no record
    pub async fn is_active(&self, name: &str) -> Result<bool, ModuleError> {
        Ok(self.persisted_status(name).await? == Some(ModuleStatus::Active))
    }

    /// Registered modules that declare `name` as a requirement
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.modules
            .read()
            .values()
            .filter(|m| m.metadata().required_modules().contains(name))
            .map(|m| m.metadata().name.clone())
            .collect()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn store(&self) -> &Arc<dyn ModuleStore> {
        &self.store
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Module>, ModuleError> {
        self.get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    async fn persisted_status(&self, name: &str) -> Result<Option<ModuleStatus>, ModuleError> {
        let record = self
            .store
            .find_by_name(name)
            .await
            .map_err(ModuleError::Persistence)?;
        Ok(record.map(|r| r.status))
    }

    /// Module defaults overlaid with host overrides
    fn merged_config(&self, module: &dyn Module) -> ModuleConfigMap {
        let mut config = module.default_config().unwrap_or_default();
        if let Some(overrides) = self.module_configs.get(&module.metadata().name) {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        config
    }

    /// Merged config, which the module must accept; only forward transitions
    /// gate on it
    fn resolve_config(&self, module: &dyn Module) -> Result<ModuleConfigMap, ModuleError> {
        let config = self.merged_config(module);
        if !module.validate_config(&config) {
            return Err(ModuleError::InvalidConfig(module.metadata().name.clone()));
        }
        Ok(config)
    }

    fn build_context(&self, name: &str, config: ModuleConfigMap) -> ModuleContext {
        ModuleContext::new(
            name,
            Arc::clone(&self.store),
            config,
            Arc::clone(&self.events),
            Arc::clone(&self.services),
        )
    }

    async fn run_hook(
        &self,
        module: &Arc<dyn Module>,
        hook: Hook,
        config: ModuleConfigMap,
    ) -> Result<(), ModuleError> {
        let name = module.metadata().name.clone();
        let ctx = self.build_context(&name, config);
        debug!("Running {} hook for module {}", hook, name);

        let call = async {
            match hook {
                Hook::Install => module.install(&ctx).await,
                Hook::Activate => module.activate(&ctx).await,
                Hook::Deactivate => module.deactivate(&ctx).await,
                Hook::Uninstall => module.uninstall(&ctx).await,
            }
        };

        let result = match with_optional_timeout(call, self.hook_timeout).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "timed out after {:?}",
                self.hook_timeout.unwrap_or_default()
            )),
        };

        result.map_err(|source| ModuleError::HookExecution {
            module: name,
            hook,
            source,
        })
    }
}
