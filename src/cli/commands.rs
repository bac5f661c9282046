//! Command handlers. Each returns the text to print.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::warn;

use super::Ctx;
use crate::module::registry::ManifestModule;
use crate::storage::{AuditEntry, ModuleStatus};

/// Run `op` and record its outcome for `resource`
async fn audited<F>(ctx: &Ctx, action: &str, resource: &str, op: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let result = op.await;
    let entry = AuditEntry::new(&ctx.actor, action, resource, result.is_ok());
    let entry = match &result {
        Ok(()) => entry,
        Err(e) => entry.with_details(format!("{e:#}")),
    };
    if let Err(e) = ctx.host.storage().audit().record(&entry) {
        warn!("Failed to record audit entry for {} {}: {:#}", action, resource, e);
    }
    result
}

pub async fn install(ctx: &Ctx, name: &str, version: Option<&str>) -> anyhow::Result<String> {
    audited(ctx, "install", name, async {
        let discovered = ctx.host.discovery().discover_module(name)?;
        if let Some(wanted) = version {
            if discovered.manifest.version != wanted {
                return Err(anyhow!(
                    "module {} is available at v{}, not v{}",
                    name,
                    discovered.manifest.version,
                    wanted
                ));
            }
        }
        ctx.host
            .registry()
            .register(Arc::new(ManifestModule::new(discovered.manifest)))
            .await?;
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(format!("Module {name} installed"))
}

pub async fn activate(ctx: &Ctx, name: &str) -> anyhow::Result<String> {
    audited(ctx, "activate", name, async {
        ctx.host.registry().activate(name).await?;
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(format!("Module {name} activated"))
}

pub async fn deactivate(ctx: &Ctx, name: &str) -> anyhow::Result<String> {
    audited(ctx, "deactivate", name, async {
        ctx.host.registry().deactivate(name).await?;
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(format!("Module {name} deactivated"))
}

pub async fn uninstall(ctx: &Ctx, name: &str) -> anyhow::Result<String> {
    audited(ctx, "uninstall", name, async {
        ctx.host.registry().unregister(name).await?;
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(format!("Module {name} uninstalled"))
}

/// Reads persisted records directly; in-memory state is not consulted
pub async fn list(ctx: &Ctx) -> anyhow::Result<String> {
    let records = ctx.host.registry().store().list().await?;
    if records.is_empty() {
        return Ok("No modules installed".to_string());
    }

    let mut out = String::from("Installed modules:\n");
    for record in records {
        let marker = if record.status == ModuleStatus::Active {
            '●'
        } else {
            '○'
        };
        writeln!(
            out,
            "  {} {} (v{}) - {}",
            marker, record.name, record.version, record.status
        )?;
    }
    Ok(out)
}

pub fn audit(ctx: &Ctx, limit: usize) -> anyhow::Result<String> {
    let entries = ctx.host.storage().audit().recent(limit)?;
    if entries.is_empty() {
        return Ok("No audit entries".to_string());
    }

    let mut out = String::new();
    for entry in entries {
        write!(
            out,
            "{} {} {} {} {}",
            entry.timestamp,
            entry.actor,
            entry.action,
            entry.resource,
            if entry.success { "ok" } else { "FAILED" }
        )?;
        if let Some(details) = &entry.details {
            write!(out, ": {details}")?;
        }
        out.push('\n');
    }
    Ok(out)
}
