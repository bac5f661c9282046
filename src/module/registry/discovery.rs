//! Module discovery
//!
//! Scans the modules directory for `<dir>/module.toml` manifests.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::ModuleError;

/// Manifest file looked for in each module directory
pub const MANIFEST_FILE: &str = "module.toml";

/// Discovered module information
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Module directory path
    pub directory: PathBuf,
    /// Module manifest
    pub manifest: ModuleManifest,
}

/// Module discovery scanner
pub struct ModuleDiscovery {
    /// Base directory to scan for modules
    modules_dir: PathBuf,
}

impl ModuleDiscovery {
    /// Create a new module discovery scanner
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Discover all modules in the modules directory, ordered by name
    ///
    /// A missing directory yields no modules. Unreadable or invalid manifests
    /// are skipped with a warning.
    pub fn discover_modules(&self) -> Result<Vec<DiscoveredModule>, ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        if !self.modules_dir.exists() {
            debug!("Modules directory {:?} does not exist", self.modules_dir);
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.modules_dir).map_err(|e| {
            ModuleError::Persistence(anyhow::anyhow!(
                "Failed to read modules directory {:?}: {}",
                self.modules_dir,
                e
            ))
        })?;

        let mut modules = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let manifest_path = path.join(MANIFEST_FILE);
            if !manifest_path.exists() {
                debug!("No {} found in {:?}, skipping", MANIFEST_FILE, path);
                continue;
            }

            match ModuleManifest::from_file(&manifest_path) {
                Ok(manifest) => modules.push(DiscoveredModule {
                    directory: path,
                    manifest,
                }),
                Err(e) => {
                    warn!("Failed to parse manifest in {:?}: {}", path, e);
                }
            }
        }

        modules.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        info!("Discovered {} modules", modules.len());
        Ok(modules)
    }

    /// Discover a specific module by name
    ///
    /// Looks in `<modules_dir>/<name>` first, then falls back to a scan in
    /// case the directory name differs from the manifest name.
    pub fn discover_module(&self, module_name: &str) -> Result<DiscoveredModule, ModuleError> {
        let module_dir = self.modules_dir.join(module_name);
        let manifest_path = module_dir.join(MANIFEST_FILE);

        if manifest_path.exists() {
            let manifest = ModuleManifest::from_file(&manifest_path)?;
            if manifest.name == module_name {
                return Ok(DiscoveredModule {
                    directory: module_dir,
                    manifest,
                });
            }
            warn!(
                "Manifest in {:?} declares module {}, not {}",
                module_dir, manifest.name, module_name
            );
        }

        self.discover_modules()?
            .into_iter()
            .find(|m| m.manifest.name == module_name)
            .ok_or_else(|| ModuleError::NotFound(module_name.to_string()))
    }
}
