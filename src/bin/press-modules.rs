//! press-modules: install, activate, deactivate, uninstall and list Press modules
//!
//! Usage:
//!   press-modules [--config <path>] [--actor <name>] <command>

use clap::Parser;
use press_core::cli::{run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
