//! Persistent module records
//!
//! One row per registered module, keyed by name. The persisted status is the
//! authoritative answer to "is this module active"; the registry re-reads it
//! on every activation decision.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::storage::database::Tree;
use crate::utils::current_timestamp;

/// Persisted lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    Installed,
    Active,
    Inactive,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Installed => "INSTALLED",
            ModuleStatus::Active => "ACTIVE",
            ModuleStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted module row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub version: String,
    pub status: ModuleStatus,
    /// Unix seconds when the row was first created
    pub installed_at: u64,
    /// Unix seconds of the last write
    pub updated_at: u64,
}

/// Persistent module store contract
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Fetch the record for `name`
    async fn find_by_name(&self, name: &str) -> Result<Option<ModuleRecord>>;

    /// Create or overwrite version and status; `installed_at` of an existing row is kept
    async fn upsert(&self, name: &str, version: &str, status: ModuleStatus)
        -> Result<ModuleRecord>;

    /// Change the status of an existing record; fails if there is none
    async fn update_status(&self, name: &str, status: ModuleStatus) -> Result<ModuleRecord>;

    /// Delete the record; deleting a missing record is a no-op
    async fn delete(&self, name: &str) -> Result<()>;

    /// All records ordered by name (reporting only)
    async fn list(&self) -> Result<Vec<ModuleRecord>>;
}

/// `ModuleStore` over a database tree
pub struct DatabaseModuleStore {
    tree: Arc<dyn Tree>,
}

impl DatabaseModuleStore {
    /// Create a module store over the `modules` tree
    pub fn new(tree: Arc<dyn Tree>) -> Self {
        Self { tree }
    }

    fn read(&self, name: &str) -> Result<Option<ModuleRecord>> {
        match self.tree.get(name.as_bytes())? {
            Some(data) => {
                let record: ModuleRecord = bincode::deserialize(&data)
                    .with_context(|| format!("corrupt module record for {}", name))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write(&self, record: &ModuleRecord) -> Result<()> {
        let value = bincode::serialize(record)?;
        self.tree.insert(record.name.as_bytes(), &value)
    }
}

#[async_trait]
impl ModuleStore for DatabaseModuleStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<ModuleRecord>> {
        self.read(name)
    }

    async fn upsert(
        &self,
        name: &str,
        version: &str,
        status: ModuleStatus,
    ) -> Result<ModuleRecord> {
        let now = current_timestamp();
        let installed_at = self.read(name)?.map(|r| r.installed_at).unwrap_or(now);
        let record = ModuleRecord {
            name: name.to_string(),
            version: version.to_string(),
            status,
            installed_at,
            updated_at: now,
        };
        self.write(&record)?;
        Ok(record)
    }

    async fn update_status(&self, name: &str, status: ModuleStatus) -> Result<ModuleRecord> {
        let mut record = self
            .read(name)?
            .ok_or_else(|| anyhow::anyhow!("no module record for {}", name))?;
        record.status = status;
        record.updated_at = current_timestamp();
        self.write(&record)?;
        Ok(record)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.tree.remove(name.as_bytes())
    }

    async fn list(&self) -> Result<Vec<ModuleRecord>> {
        // Keys are module names, so tree order is name order
        self.tree
            .iter()
            .map(|item| -> Result<ModuleRecord> {
                let (_, value) = item?;
                Ok(bincode::deserialize(&value)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::{create_database, default_backend, MODULES_TREE};
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> DatabaseModuleStore {
        let db = create_database(temp_dir.path(), default_backend()).unwrap();
        DatabaseModuleStore::new(Arc::from(db.open_tree(MODULES_TREE).unwrap()))
    }

    #[tokio::test]
    async fn test_upsert_creates_then_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let created = store
            .upsert("blog", "1.0.0", ModuleStatus::Installed)
            .await
            .unwrap();
        store.update_status("blog", ModuleStatus::Active).await.unwrap();

        let updated = store
            .upsert("blog", "1.1.0", ModuleStatus::Installed)
            .await
            .unwrap();
        assert_eq!(updated.version, "1.1.0");
        assert_eq!(updated.status, ModuleStatus::Installed);
        assert_eq!(updated.installed_at, created.installed_at);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_requires_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        assert!(store
            .update_status("ghost", ModuleStatus::Active)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .upsert("shop", "2.0.0", ModuleStatus::Installed)
            .await
            .unwrap();
        store
            .upsert("blog", "1.0.0", ModuleStatus::Installed)
            .await
            .unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["blog", "shop"]);

        store.delete("blog").await.unwrap();
        store.delete("blog").await.unwrap();
        assert!(store.find_by_name("blog").await.unwrap().is_none());
        assert!(store.find_by_name("shop").await.unwrap().is_some());
    }
}
