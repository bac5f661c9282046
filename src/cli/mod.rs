//! Command surface for `press-modules`.
//!
//! Every lifecycle command:
//! - opens the host and restores persisted modules from their manifests
//! - goes through the registry, so hooks, persistence and events stay in step
//! - leaves one audit entry recording actor, action, module and outcome

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::HostConfig;
use crate::host::ModuleHost;
use crate::utils::init_logging_from_config;

pub mod commands;

// =============================================================================
// Entry + global options
// =============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "press-modules",
    version,
    about = "Manage Press modules",
    infer_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Host configuration file (.toml or .json).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Actor recorded in the audit trail.
    #[arg(long, global = true, value_name = "ACTOR", default_value = "cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install a module from the modules directory.
    Install {
        name: String,
        /// Require this exact manifest version.
        #[arg(long, short = 'v', value_name = "VERSION")]
        version: Option<String>,
    },

    /// Activate an installed module.
    Activate { name: String },

    /// Deactivate an active module.
    Deactivate { name: String },

    /// Deactivate (if active) and remove a module.
    #[command(alias = "remove")]
    Uninstall { name: String },

    /// List persisted modules.
    #[command(alias = "ls")]
    List,

    /// Show recent audit entries.
    Audit {
        /// Number of entries to show.
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
}

/// Per-invocation state handed to command handlers
pub struct Ctx {
    pub host: ModuleHost,
    pub actor: String,
}

/// Load the host configuration named on the command line, or the defaults
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HostConfig> {
    let mut config = match path {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HostConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Run a parsed command line, returning what should be printed
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let config = load_config(cli.config.as_ref())?;
    init_logging_from_config(config.logging.as_ref());

    let host = ModuleHost::open(config)?;
    host.restore_discovered()
        .await
        .context("restoring persisted modules")?;

    let ctx = Ctx {
        host,
        actor: cli.actor,
    };
    let output = dispatch(&ctx, cli.command).await;
    ctx.host.shutdown()?;
    output
}

pub async fn dispatch(ctx: &Ctx, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Install { name, version } => {
            commands::install(ctx, &name, version.as_deref()).await
        }
        Commands::Activate { name } => commands::activate(ctx, &name).await,
        Commands::Deactivate { name } => commands::deactivate(ctx, &name).await,
        Commands::Uninstall { name } => commands::uninstall(ctx, &name).await,
        Commands::List => commands::list(ctx).await,
        Commands::Audit { limit } => commands::audit(ctx, limit),
    }
}
