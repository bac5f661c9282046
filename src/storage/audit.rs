//! Append-only audit trail for externally triggered lifecycle commands
//!
//! The registry itself never writes here; the calling layer (the CLI, or a
//! host's admin surface) records who did what and whether it worked.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::storage::database::Tree;
use crate::utils::{current_timestamp, current_timestamp_nanos};

/// One audit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    /// Unix seconds
    pub timestamp: u64,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub success: bool,
    pub details: Option<String>,
}

impl AuditEntry {
    /// New entry stamped with a fresh id and the current time
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: current_timestamp(),
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            success,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Audit log over the `audit_log` tree
pub struct AuditStore {
    tree: Arc<dyn Tree>,
    /// Breaks ties between entries recorded in the same nanosecond
    sequence: AtomicU64,
}

impl AuditStore {
    pub fn new(tree: Arc<dyn Tree>) -> Self {
        Self {
            tree,
            sequence: AtomicU64::new(0),
        }
    }

    /// Append an entry
    pub fn record(&self, entry: &AuditEntry) -> Result<()> {
        // Big-endian nanos keep keys in insertion order
        let mut key = current_timestamp_nanos().to_be_bytes().to_vec();
        key.extend_from_slice(&self.sequence.fetch_add(1, Ordering::Relaxed).to_be_bytes());
        let value = bincode::serialize(entry)?;
        self.tree.insert(&key, &value)
    }

    /// Newest `limit` entries, oldest first
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let total = self.tree.len()?;
        self.tree
            .iter()
            .skip(total.saturating_sub(limit))
            .map(|item| -> Result<AuditEntry> {
                let (_, value) = item?;
                Ok(bincode::deserialize(&value)?)
            })
            .collect()
    }

    pub fn len(&self) -> Result<usize> {
        self.tree.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::{create_database, default_backend, AUDIT_LOG_TREE};
    use tempfile::TempDir;

    #[test]
    fn test_recent_returns_newest_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let db = create_database(temp_dir.path(), default_backend()).unwrap();
        let audit = AuditStore::new(Arc::from(db.open_tree(AUDIT_LOG_TREE).unwrap()));
        assert!(audit.is_empty().unwrap());

        for action in ["install", "activate", "deactivate"] {
            audit
                .record(&AuditEntry::new("admin", action, "blog", true))
                .unwrap();
        }
        audit
            .record(
                &AuditEntry::new("admin", "uninstall", "blog", false)
                    .with_details("uninstall hook failed"),
            )
            .unwrap();

        let recent = audit.recent(2).unwrap();
        let actions: Vec<&str> = recent.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["deactivate", "uninstall"]);
        assert!(!recent[1].success);
        assert_eq!(recent[1].details.as_deref(), Some("uninstall hook failed"));
        assert_eq!(audit.len().unwrap(), 4);
    }

    #[test]
    fn test_stores_keep_separate_sequences() {
        let first_dir = TempDir::new().unwrap();
        let second_dir = TempDir::new().unwrap();
        let open = |dir: &TempDir| {
            let db = create_database(dir.path(), default_backend()).unwrap();
            AuditStore::new(Arc::from(db.open_tree(AUDIT_LOG_TREE).unwrap()))
        };
        let first = open(&first_dir);
        let second = open(&second_dir);

        for _ in 0..3 {
            first
                .record(&AuditEntry::new("admin", "install", "blog", true))
                .unwrap();
        }
        second
            .record(&AuditEntry::new("admin", "install", "shop", true))
            .unwrap();

        assert_eq!(first.sequence.load(Ordering::Relaxed), 3);
        assert_eq!(second.sequence.load(Ordering::Relaxed), 1);
        assert_eq!(second.recent(10).unwrap()[0].resource, "shop");
    }
}
