//! ACL (de)serialization and validation (§3 invariant 3, §6).

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use meridian_core::domain::acl::Acl;

#[derive(Subcommand)]
pub enum AclCommand {
    /// Deserialize an ACL string and print it as JSON
    Parse { serialized: String },

    /// Deserialize and validate an ACL string against its invariants
    Validate { serialized: String },
}

pub async fn handle_command(command: AclCommand) -> Result<()> {
    match command {
        AclCommand::Parse { serialized } => parse(serialized),
        AclCommand::Validate { serialized } => validate(serialized),
    }
}

fn parse(serialized: String) -> Result<()> {
    let acl = Acl::deserialize(&serialized)?;
    println!("{}", serde_json::to_string_pretty(&acl)?);
    Ok(())
}

fn validate(serialized: String) -> Result<()> {
    let acl = Acl::deserialize(&serialized)?;
    match acl.validate() {
        Ok(()) => {
            println!("{}", "valid".green().bold());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "invalid:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
