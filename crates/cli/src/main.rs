//! COD Form CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cod-cli migrate
//!
//! # Delete throttle log rows older than 30 days
//! cod-cli prune --days 30
//!
//! # Remove an address from a shop's block list
//! cod-cli unblock-ip --shop demo.myshopify.com --ip 203.0.113.7
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cod-cli")]
#[command(author, version, about = "COD Form CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete old rows from the order and OTP throttle logs
    Prune {
        /// Keep rows newer than this many days
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },
    /// Remove an IP address from a shop's block list
    UnblockIp {
        /// Shop domain (e.g. demo.myshopify.com)
        #[arg(short, long)]
        shop: String,

        /// Blocked IP address
        #[arg(short, long)]
        ip: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Prune { days } => commands::maintenance::prune(days).await?,
        Commands::UnblockIp { shop, ip } => commands::maintenance::unblock_ip(&shop, &ip).await?,
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_prune_default_days() {
        let cli = Cli::try_parse_from(["cod-cli", "prune"]).unwrap();
        assert!(matches!(cli.command, Commands::Prune { days: 30 }));
    }

    #[test]
    fn test_unblock_requires_shop_and_ip() {
        assert!(Cli::try_parse_from(["cod-cli", "unblock-ip", "--ip", "203.0.113.7"]).is_err());
        let cli = Cli::try_parse_from([
            "cod-cli",
            "unblock-ip",
            "--shop",
            "demo.myshopify.com",
            "--ip",
            "203.0.113.7",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::UnblockIp { .. }));
    }
}
