//! Configuration file validation (§6).

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use meridian_core::application::plugin_manager::PluginManager;
use meridian_core::infrastructure::config::load_config;
use meridian_core::infrastructure::plugin_loader::PluginLoader;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Parse a config file and apply every directive against a scratch
    /// plugin manager, reporting the first malformed line if any.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Validate { file } => validate(file).await,
    }
}

async fn validate(file: PathBuf) -> Result<()> {
    let manager = PluginManager::new();
    let mut loader = PluginLoader::new();
    match load_config(&file, &manager, &mut loader) {
        Ok(applied) => {
            println!("{} {} directive(s) applied from {}", "ok:".green().bold(), applied, file.display());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "invalid:".red().bold(), e);
            Err(e).context(format!("configuration {} is invalid", file.display()))
        }
    }
}
