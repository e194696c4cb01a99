//! FitLog CLI - Synchronize and audit FitLog data from the terminal
//!
//! Thin front-end over `fitlog-core`: every subcommand maps onto one
//! engine or integrity-checker operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;

use commands::parse_domain;
use config::{AppContext, CliConfig};
use error::CliError;

#[derive(Parser)]
#[command(name = "fitlog")]
#[command(about = "Synchronize and audit FitLog data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize with the remote store
    Sync {
        /// Limit the pass to one domain
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,
        /// Abort the pass after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },
    /// Audit local cache against the remote store
    Verify {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the local cache from the remote store (deep recovery)
    Repair {
        /// Confirm discarding unsynced local changes
        #[arg(long)]
        yes: bool,
    },
    /// Show device identity, watermarks, and pending counts
    Status,
    /// List unsynced local changes
    Pending {
        /// Limit the listing to one domain
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the conflict-resolution policy
    Policy {
        /// New policy (server-wins, client-wins, newest-wins, manual)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitlog=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let env_config = CliConfig::from_env();
    let ctx = AppContext::open(&env_config, cli.db_path).await?;

    match cli.command {
        Commands::Sync {
            domain,
            timeout_secs,
        } => {
            let domain = parse_domain(domain.as_deref())?;
            commands::sync::run_sync(&ctx, domain, timeout_secs).await
        }
        Commands::Verify { json } => commands::verify::run_verify(&ctx, json).await,
        Commands::Repair { yes } => commands::repair::run_repair(&ctx, yes).await,
        Commands::Status => commands::status::run_status(&ctx).await,
        Commands::Pending { domain, json } => {
            let domain = parse_domain(domain.as_deref())?;
            commands::pending::run_pending(&ctx, domain, json).await
        }
        Commands::Policy { value } => commands::policy::run_policy(&ctx, value.as_deref()).await,
    }
}
