//! Stack introspection from a configuration file (§4.8).

use anyhow::{Context, Result};
use clap::Subcommand;
use meridian_core::application::plugin_manager::PluginManager;
use meridian_core::application::proc_catalog::ProcCatalog;
use meridian_core::application::security_service::create_security_context;
use meridian_core::application::stack::StackInstance;
use meridian_core::domain::security::SecurityCredentials;
use meridian_core::infrastructure::config::load_config;
use meridian_core::infrastructure::plugin_loader::PluginLoader;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum ProcCommand {
    /// Print the live catalog factory chain (front-of-list wins)
    Stack {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Print the SecurityContext a DN/FQAN pair resolves to
    Whoami {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        #[arg(long)]
        dn: String,
        #[arg(long, value_delimiter = ',')]
        fqan: Vec<String>,
    },
}

pub async fn handle_command(command: ProcCommand) -> Result<()> {
    match command {
        ProcCommand::Stack { config } => stack(config).await,
        ProcCommand::Whoami { config, dn, fqan } => whoami(config, dn, fqan).await,
    }
}

fn build_stack(config: &PathBuf) -> Result<StackInstance> {
    let manager = Arc::new(PluginManager::new());
    let mut loader = PluginLoader::new();
    load_config(config, &manager, &mut loader).with_context(|| format!("loading {}", config.display()))?;
    Ok(StackInstance::new(manager))
}

async fn stack(config: PathBuf) -> Result<()> {
    let stack = build_stack(&config)?;
    stack.catalog().context("materialising catalog")?;
    let proc = ProcCatalog::new(stack.handle());
    let bytes = proc.render("/proc/stack")?;
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

async fn whoami(config: PathBuf, dn: String, fqan: Vec<String>) -> Result<()> {
    let stack = build_stack(&config)?;
    let authn = stack.authn().context("materialising authn")?;
    let credentials = SecurityCredentials {
        mechanism: "cli".into(),
        client_name: dn,
        remote_address: "local".into(),
        fqans: fqan,
        session_id: None,
    };
    let ctx = create_security_context(authn.as_ref(), credentials).await?;
    stack.set_security_context(ctx);
    let proc = ProcCatalog::new(stack.handle());
    let bytes = proc.render("/proc/whoami")?;
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}
