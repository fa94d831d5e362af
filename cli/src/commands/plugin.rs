//! Dynamic-library plugin loading (§4.1).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use meridian_core::application::plugin_manager::PluginManager;
use meridian_core::infrastructure::plugin_loader::PluginLoader;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PluginCommand {
    /// Load a shared library, call its registration symbol, and report the
    /// resulting catalog factory chain (front-of-list wins).
    Load {
        /// Exported registration symbol, e.g. `meridian_plugin_register`
        symbol: String,
        /// Path to the shared library
        path: PathBuf,
    },
}

pub async fn handle_command(command: PluginCommand) -> Result<()> {
    match command {
        PluginCommand::Load { symbol, path } => load(symbol, path).await,
    }
}

async fn load(symbol: String, path: PathBuf) -> Result<()> {
    let manager = PluginManager::new();
    let mut loader = PluginLoader::new();
    loader.load(&path, &symbol, &manager).with_context(|| format!("failed to load plugin {}", path.display()))?;

    println!("{} loaded {} via {}", "ok:".green().bold(), path.display(), symbol);
    let ids = manager.catalog_factory_ids();
    if !ids.is_empty() {
        println!("catalog factory chain: {}", ids.join(" over "));
    }
    Ok(())
}
