//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use press_core::{HostConfig, ModuleHost};
use tempfile::TempDir;

/// Isolated data and modules directories plus a config pointing at them
pub struct HostFixture {
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
    pub config: HostConfig,
}

impl HostFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        std::fs::create_dir_all(&modules_dir).unwrap();

        let mut config = HostConfig::default();
        config.storage.data_dir = temp_dir.path().join("data").display().to_string();
        config.modules.modules_dir = modules_dir.display().to_string();

        Self {
            temp_dir,
            modules_dir,
            config,
        }
    }

    /// Write `<modules_dir>/<name>/module.toml`; `extra` is appended verbatim
    pub fn write_manifest(&self, name: &str, version: &str, extra: &str) {
        let module_dir = self.modules_dir.join(name);
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(
            module_dir.join("module.toml"),
            format!("name = \"{name}\"\nversion = \"{version}\"\n{extra}"),
        )
        .unwrap();
    }

    pub fn open(&self) -> ModuleHost {
        ModuleHost::open(self.config.clone()).unwrap()
    }
}
