//! Storage layer for the module host
//!
//! Persists module records and the audit trail. Supports multiple database
//! backends via feature flags (redb, sled).

pub mod audit;
pub mod database;
pub mod module_store;

use anyhow::Result;
use database::{
    create_database, default_backend, fallback_backend, Database, DatabaseBackend, AUDIT_LOG_TREE,
    MODULES_TREE,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub use audit::{AuditEntry, AuditStore};
pub use module_store::{DatabaseModuleStore, ModuleRecord, ModuleStatus, ModuleStore};

/// Storage manager that owns the database and the stores built on it
pub struct Storage {
    db: Arc<dyn Database>,
    backend: DatabaseBackend,
    modules: Arc<DatabaseModuleStore>,
    audit: Arc<AuditStore>,
}

impl Storage {
    /// Create a new storage instance with default backend
    ///
    /// Attempts the default backend (redb) and falls back to sled if redb
    /// fails and sled is compiled in.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let default = default_backend();
        Self::with_preferred_backend(data_dir, default)
    }

    /// Create a storage instance, trying `preferred` first and then its fallback
    pub fn with_preferred_backend<P: AsRef<Path>>(
        data_dir: P,
        preferred: DatabaseBackend,
    ) -> Result<Self> {
        match Self::with_backend(data_dir.as_ref(), preferred) {
            Ok(storage) => Ok(storage),
            Err(e) => {
                if let Some(fallback) = fallback_backend(preferred) {
                    warn!(
                        "Failed to initialize {:?} backend: {}. Falling back to {:?}.",
                        preferred, e, fallback
                    );
                    Self::with_backend(data_dir, fallback)
                } else {
                    Err(anyhow::anyhow!(
                        "Failed to initialize {:?} backend: {}. No fallback backend available.",
                        preferred,
                        e
                    ))
                }
            }
        }
    }

    /// Create a new storage instance with specified backend
    pub fn with_backend<P: AsRef<Path>>(data_dir: P, backend: DatabaseBackend) -> Result<Self> {
        let db: Arc<dyn Database> = Arc::from(create_database(data_dir.as_ref(), backend)?);

        let modules = Arc::new(DatabaseModuleStore::new(Arc::from(
            db.open_tree(MODULES_TREE)?,
        )));
        let audit = Arc::new(AuditStore::new(Arc::from(db.open_tree(AUDIT_LOG_TREE)?)));

        info!(
            "Opened {:?} module store at {}",
            backend,
            data_dir.as_ref().display()
        );

        Ok(Self {
            db,
            backend,
            modules,
            audit,
        })
    }

    /// Backend actually in use
    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Module record store (as Arc for sharing)
    pub fn modules(&self) -> Arc<DatabaseModuleStore> {
        Arc::clone(&self.modules)
    }

    /// Audit trail (as Arc for sharing)
    pub fn audit(&self) -> Arc<AuditStore> {
        Arc::clone(&self.audit)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()
    }
}
