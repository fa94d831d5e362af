//! The `meridian` binary: a thin driver over `meridian-core` for plugin
//! loading, catalog browsing, token issuance, and pool administration.
//!
//! Grounded on the core crate's own CLI, mirroring its CLI-first shape
//! (`clap::Parser` + `tracing-subscriber` + `colored`), minus the daemon
//! lifecycle the library here has no equivalent of — every subcommand runs
//! to completion and exits, rather than talking to a long-lived background
//! process.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{AclCommand, ConfigCommand, MapfileCommand, PluginCommand, ProcCommand, TokenCommand};

#[derive(Parser)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MERIDIAN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Load and smoke-test a plugin shared library
    #[command(name = "plugin")]
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },

    /// Issue and verify capability tokens
    #[command(name = "token")]
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },

    /// Parse, validate, and serialize ACLs
    #[command(name = "acl")]
    Acl {
        #[command(subcommand)]
        command: AclCommand,
    },

    /// Resolve a DN against a mapfile
    #[command(name = "mapfile")]
    Mapfile {
        #[command(subcommand)]
        command: MapfileCommand,
    },

    /// Introspect a live stack built from a configuration file
    #[command(name = "proc")]
    Proc {
        #[command(subcommand)]
        command: ProcCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Config { command } => commands::config::handle_command(command).await,
        Commands::Plugin { command } => commands::plugin::handle_command(command).await,
        Commands::Token { command } => commands::token::handle_command(command).await,
        Commands::Acl { command } => commands::acl::handle_command(command).await,
        Commands::Mapfile { command } => commands::mapfile::handle_command(command).await,
        Commands::Proc { command } => commands::proc::handle_command(command).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
