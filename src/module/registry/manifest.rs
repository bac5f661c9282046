//! Module manifest parsing
//!
//! Handles parsing module.toml manifests into hook-less module definitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::module::traits::{Module, ModuleConfigMap, ModuleError, ModuleMetadata, ModuleRequirements};

/// Type names accepted in `[config_schema]`
const SCHEMA_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array", "object"];

/// Module manifest (module.toml structure)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module name
    pub name: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Human-readable description
    pub description: Option<String>,
    /// Module author
    pub author: Option<String>,
    /// Required dependencies (module names with versions)
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    /// Host core version and further required modules
    #[serde(default)]
    pub requires: ModuleRequirements,
    /// Default configuration
    #[serde(default)]
    pub config: ModuleConfigMap,
    /// Config key -> expected JSON type name
    #[serde(default)]
    pub config_schema: HashMap<String, String>,
}

impl ModuleManifest {
    /// Load manifest from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ModuleError::InvalidDefinition(format!(
                "Failed to read manifest file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse manifest TOML
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::InvalidDefinition(format!("Failed to parse manifest TOML: {}", e))
        })?;

        if manifest.name.is_empty() {
            return Err(ModuleError::InvalidDefinition(
                "Module name cannot be empty".to_string(),
            ));
        }
        for (key, type_name) in &manifest.config_schema {
            if !SCHEMA_TYPES.contains(&type_name.as_str()) {
                return Err(ModuleError::InvalidDefinition(format!(
                    "Unknown type {} for config key {} in module {}",
                    type_name, key, manifest.name
                )));
            }
        }

        Ok(manifest)
    }

    /// Convert to ModuleMetadata
    pub fn to_metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone().unwrap_or_default(),
            author: self.author.clone().unwrap_or_default(),
            dependencies: self.dependencies.clone(),
            requires: self.requires.clone(),
        }
    }

    /// Whether every schema key present in `config` has its declared type
    pub fn check_config(&self, config: &ModuleConfigMap) -> bool {
        self.config_schema.iter().all(|(key, type_name)| {
            let Some(value) = config.get(key) else {
                return true;
            };
            let matches = match type_name.as_str() {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => false,
            };
            if !matches {
                debug!(
                    "Config key {} of module {} is not a {}: {}",
                    key, self.name, type_name, value
                );
            }
            matches
        })
    }
}

impl From<ModuleManifest> for ModuleMetadata {
    fn from(manifest: ModuleManifest) -> Self {
        manifest.to_metadata()
    }
}

/// A module defined only by its manifest: no hooks, config from `[config]`
#[derive(Debug, Clone)]
pub struct ManifestModule {
    metadata: ModuleMetadata,
    manifest: ModuleManifest,
}

impl ManifestModule {
    pub fn new(manifest: ModuleManifest) -> Self {
        Self {
            metadata: manifest.to_metadata(),
            manifest,
        }
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }
}

#[async_trait]
impl Module for ManifestModule {
    fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    fn default_config(&self) -> Option<ModuleConfigMap> {
        if self.manifest.config.is_empty() {
            None
        } else {
            Some(self.manifest.config.clone())
        }
    }

    fn validate_config(&self, config: &ModuleConfigMap) -> bool {
        self.manifest.check_config(config)
    }
}

/// Convert a TOML table into a config map
pub(crate) fn toml_table_to_config(table: toml::Table) -> Result<ModuleConfigMap, ModuleError> {
    match serde_json::to_value(table) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(ModuleConfigMap::new()),
        Err(e) => Err(ModuleError::InvalidDefinition(format!(
            "Config table is not representable as JSON: {}",
            e
        ))),
    }
}
