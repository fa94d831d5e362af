//! Capability token issuance and verification (§4.4/§6).

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use meridian_core::domain::token::{generate_token, validate_token};

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Issue a capability token for `pfn`
    Generate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        pfn: String,
        #[arg(long)]
        secret: String,
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
        #[arg(long)]
        write: bool,
    },

    /// Verify a capability token
    Verify {
        token: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        pfn: String,
        #[arg(long)]
        secret: String,
        #[arg(long)]
        want_write: bool,
    },
}

pub async fn handle_command(command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Generate { user, pfn, secret, ttl, write } => generate(user, pfn, secret, ttl, write),
        TokenCommand::Verify { token, user, pfn, secret, want_write } => verify(token, user, pfn, secret, want_write),
    }
}

fn generate(user: String, pfn: String, secret: String, ttl: i64, write: bool) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let token = generate_token(&user, &pfn, secret.as_bytes(), ttl, write, now);
    println!("{token}");
    Ok(())
}

fn verify(token: String, user: String, pfn: String, secret: String, want_write: bool) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    match validate_token(&token, &user, &pfn, secret.as_bytes(), want_write, now) {
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
