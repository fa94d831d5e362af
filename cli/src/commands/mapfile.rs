//! DN → VO mapfile lookups (§4.4).

use anyhow::Result;
use clap::Subcommand;
use meridian_core::infrastructure::mapfile::MapfileCache;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum MapfileCommand {
    /// Resolve a DN against a mapfile
    Lookup {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        dn: String,
    },
}

pub async fn handle_command(command: MapfileCommand) -> Result<()> {
    match command {
        MapfileCommand::Lookup { file, dn } => lookup(file, dn),
    }
}

fn lookup(file: PathBuf, dn: String) -> Result<()> {
    let cache = MapfileCache::new(file);
    let vo = cache.vo_from_dn(&dn)?;
    println!("{vo}");
    Ok(())
}
