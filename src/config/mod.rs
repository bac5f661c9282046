//! Configuration management for the module host
//!
//! Handles configuration loading (JSON or TOML), environment overrides and
//! validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::module::traits::ModuleConfigMap;
use crate::storage::database::DatabaseBackend;
use crate::utils::{env_bool, env_int, env_opt};

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the module store database
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database backend (redb, sled)
    #[serde(default)]
    pub backend: DatabaseBackendConfig,
}

/// Database backend selection (serializable)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendConfig {
    #[default]
    Redb,
    Sled,
}

impl From<DatabaseBackendConfig> for DatabaseBackend {
    fn from(config: DatabaseBackendConfig) -> Self {
        match config {
            DatabaseBackendConfig::Redb => DatabaseBackend::Redb,
            DatabaseBackendConfig::Sled => DatabaseBackend::Sled,
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: DatabaseBackendConfig::Redb,
        }
    }
}

/// Module system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Directory scanned for `<module>/module.toml` manifests
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Deadline for a single lifecycle hook (unset = no deadline)
    #[serde(default)]
    pub hook_timeout_seconds: Option<u64>,

    /// Per-module configuration overrides, merged over each module's defaults
    #[serde(default)]
    pub module_configs: HashMap<String, ModuleConfigMap>,
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            hook_timeout_seconds: None,
            module_configs: HashMap::new(),
        }
    }
}

impl ModulesConfig {
    /// Hook deadline as a `Duration`
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_seconds.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "press_core=debug" (RUST_LOG wins)
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Module system configuration
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl HostConfig {
    /// Load configuration from a file, choosing TOML for `.toml` and JSON otherwise
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            _ => Self::from_json_file(path),
        }
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PRESS_*` environment overrides
    ///
    /// - `PRESS_DATA_DIR`, `PRESS_MODULES_DIR`
    /// - `PRESS_HOOK_TIMEOUT_SECS`
    /// - `PRESS_LOG` (filter), `PRESS_LOG_JSON`
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_opt("PRESS_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        if let Some(dir) = env_opt("PRESS_MODULES_DIR") {
            self.modules.modules_dir = dir;
        }
        if let Some(secs) = env_int::<u64>("PRESS_HOOK_TIMEOUT_SECS") {
            self.modules.hook_timeout_seconds = Some(secs);
        }
        if let Some(filter) = env_opt("PRESS_LOG") {
            self.logging.get_or_insert_with(LoggingConfig::default).filter = Some(filter);
        }
        if env_bool("PRESS_LOG_JSON") {
            self.logging.get_or_insert_with(LoggingConfig::default).json_format = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("storage.data_dir must not be empty"));
        }
        if self.modules.modules_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("modules.modules_dir must not be empty"));
        }
        if self.modules.hook_timeout_seconds == Some(0) {
            return Err(anyhow::anyhow!(
                "modules.hook_timeout_seconds must be greater than 0 when set"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = HostConfig::default();
        assert_eq!(config.storage.data_dir, "data");
        assert_eq!(config.modules.modules_dir, "modules");
        assert!(config.modules.hook_timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_hook_timeout_rejected() {
        let mut config = HostConfig::default();
        config.modules.hook_timeout_seconds = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_with_module_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("press.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/var/lib/press"
backend = "sled"

[modules]
hook_timeout_seconds = 5

[modules.module_configs.blog]
posts_per_page = 20
title = "News"
"#,
        )
        .unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.storage.backend, DatabaseBackendConfig::Sled);
        assert_eq!(config.modules.hook_timeout(), Some(Duration::from_secs(5)));
        let blog = &config.modules.module_configs["blog"];
        assert_eq!(blog["posts_per_page"], serde_json::json!(20));
        assert_eq!(blog["title"], serde_json::json!("News"));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("press.json");
        let mut config = HostConfig::default();
        config.modules.modules_dir = "plugins".to_string();
        config.to_json_file(&path).unwrap();

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded.modules.modules_dir, "plugins");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("PRESS_DATA_DIR", "/tmp/press-data");
        std::env::set_var("PRESS_HOOK_TIMEOUT_SECS", "12");
        std::env::set_var("PRESS_LOG", "debug");

        let mut config = HostConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("PRESS_DATA_DIR");
        std::env::remove_var("PRESS_HOOK_TIMEOUT_SECS");
        std::env::remove_var("PRESS_LOG");

        assert_eq!(config.storage.data_dir, "/tmp/press-data");
        assert_eq!(config.modules.hook_timeout_seconds, Some(12));
        assert_eq!(
            config.logging.and_then(|l| l.filter).as_deref(),
            Some("debug")
        );
    }
}
