//! Module lifecycle tests
//!
//! Modules cooperating through the event bus and service registry, and
//! persisted status surviving a host restart.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use press_core::module::api::events::{MODULE_ACTIVATED, MODULE_DEACTIVATED};
use press_core::module::loader::ModuleLoader;
use press_core::{
    LifecycleEvent, Module, ModuleContext, ModuleError, ModuleMetadata, ModuleStatus,
};

mod common;
use common::HostFixture;

/// Capability published by the users module
trait UserDirectory: Send + Sync {
    fn display_name(&self, id: u32) -> String;
}

struct StaticDirectory;

impl UserDirectory for StaticDirectory {
    fn display_name(&self, id: u32) -> String {
        format!("user-{id}")
    }
}

struct UsersModule {
    metadata: ModuleMetadata,
}

#[async_trait]
impl Module for UsersModule {
    fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    async fn activate(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        let directory: Arc<dyn UserDirectory> = Arc::new(StaticDirectory);
        ctx.services.register("users.directory", directory);
        Ok(())
    }

    async fn deactivate(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        ctx.services.remove("users.directory");
        Ok(())
    }
}

/// Records lifecycle events of other modules and resolves authors on activate
struct BlogModule {
    metadata: ModuleMetadata,
    seen: Arc<Mutex<Vec<LifecycleEvent>>>,
    author: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Module for BlogModule {
    fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    async fn install(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        for topic in [MODULE_ACTIVATED, MODULE_DEACTIVATED] {
            let seen = Arc::clone(&self.seen);
            ctx.events.subscribe(topic, move |event| {
                if let Some(lifecycle) = LifecycleEvent::from_event(event) {
                    seen.lock().push(lifecycle);
                }
                Ok(())
            });
        }
        Ok(())
    }

    async fn activate(&self, ctx: &ModuleContext) -> anyhow::Result<()> {
        let directory = ctx
            .services
            .get::<dyn UserDirectory>("users.directory")
            .ok_or_else(|| anyhow::anyhow!("users.directory service is not available"))?;
        *self.author.lock() = Some(directory.display_name(7));
        Ok(())
    }
}

#[tokio::test]
async fn test_modules_share_services_and_events() {
    let fixture = HostFixture::new();
    let host = fixture.open();
    let registry = host.registry();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let author = Arc::new(Mutex::new(None));

    registry
        .register(Arc::new(UsersModule {
            metadata: ModuleMetadata::new("users", "1.0.0"),
        }))
        .await
        .unwrap();
    registry
        .register(Arc::new(BlogModule {
            metadata: ModuleMetadata::new("blog", "1.0.0").with_dependency("users", "^1.0"),
            seen: Arc::clone(&seen),
            author: Arc::clone(&author),
        }))
        .await
        .unwrap();

    // The directory service only exists while users is active
    let err = registry.activate("blog").await.unwrap_err();
    assert!(matches!(err, ModuleError::HookExecution { .. }));
    assert!(!registry.is_active("blog").await.unwrap());

    registry.activate("users").await.unwrap();
    registry.activate("blog").await.unwrap();
    assert_eq!(author.lock().as_deref(), Some("user-7"));

    registry.deactivate("users").await.unwrap();
    assert!(!host.services().has("users.directory"));

    assert_eq!(
        *seen.lock(),
        vec![
            LifecycleEvent::Activated {
                name: "users".to_string()
            },
            LifecycleEvent::Activated {
                name: "blog".to_string()
            },
            LifecycleEvent::Deactivated {
                name: "users".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_status_survives_restart() {
    let fixture = HostFixture::new();
    fixture.write_manifest("users", "1.0.0", "");
    fixture.write_manifest("blog", "1.0.0", "[dependencies]\nusers = \"1.0.0\"\n");
    fixture.write_manifest("gallery", "0.3.0", "");

    {
        let host = fixture.open();
        let discovered = host.discovery().discover_modules().unwrap();
        let blog_and_users: Vec<_> = discovered
            .into_iter()
            .filter(|d| d.manifest.name != "gallery")
            .collect();
        let order = ModuleLoader::register_in_order(
            host.registry(),
            ModuleLoader::from_discovered(&blog_and_users),
        )
        .await
        .unwrap();
        assert_eq!(order, vec!["users", "blog"]);

        host.registry().activate("blog").await.unwrap();
        host.shutdown().unwrap();
    }

    let host = fixture.open();
    assert!(host.registry().list().is_empty());

    let restored = host.restore_discovered().await.unwrap();
    assert_eq!(
        restored,
        vec![
            ("users".to_string(), ModuleStatus::Installed),
            ("blog".to_string(), ModuleStatus::Active),
        ]
    );
    assert!(host.registry().is_active("blog").await.unwrap());
    assert!(!host.registry().contains("gallery"));

    // Unregister after restart runs the full deactivate sequence
    host.registry().unregister("blog").await.unwrap();
    let records = host.registry().store().list().await.unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["users"]);
}

#[tokio::test]
async fn test_separate_hosts_are_isolated() {
    let first = HostFixture::new();
    let second = HostFixture::new();
    first.write_manifest("blog", "1.0.0", "");

    let a = first.open();
    let b = second.open();
    ModuleLoader::register_in_order(
        a.registry(),
        ModuleLoader::from_discovered(&a.discovery().discover_modules().unwrap()),
    )
    .await
    .unwrap();

    assert!(a.registry().contains("blog"));
    assert!(!b.registry().contains("blog"));
    assert!(b.registry().store().find_by_name("blog").await.unwrap().is_none());
}
