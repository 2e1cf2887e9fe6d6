//! checkin CLI - Operator shell for offline-first event check-in
//!
//! Scans, surveys, sync and reporting on top of `checkin-core`.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::attendees::run_attendees;
use crate::commands::common::{resolve_db_path, Session};
use crate::commands::completions::run_completions;
use crate::commands::export::run_export;
use crate::commands::kiosk::run_kiosk;
use crate::commands::pending::run_pending;
use crate::commands::report::run_report;
use crate::commands::scan::{run_scan, ScanArgs};
use crate::commands::sync::run_sync;
use crate::error::CliError;

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
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("checkin=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync => {
            let session = Session::open(&resolve_db_path(cli.db_path)?, cli.offline).await?;
            run_sync(&session).await?;
        }
        Commands::Scan {
            payload,
            answer1,
            answer2,
            name,
            phone,
        } => {
            let session = Session::open(&resolve_db_path(cli.db_path)?, cli.offline).await?;
            let args = ScanArgs {
                payload,
                answer1,
                answer2,
                name,
                phone,
            };
            run_scan(&session, args).await?;
        }
        Commands::Kiosk => {
            let session = Session::open(&resolve_db_path(cli.db_path)?, cli.offline).await?;
            run_kiosk(&session).await?;
        }
        Commands::Attendees { json } => run_attendees(json, &resolve_db_path(cli.db_path)?).await?,
        Commands::Pending { json } => run_pending(json, &resolve_db_path(cli.db_path)?).await?,
        Commands::Report { limit, json } => {
            let session = Session::open(&resolve_db_path(cli.db_path)?, cli.offline).await?;
            run_report(&session, limit, json).await?;
        }
        Commands::Export { format, output } => {
            let session = Session::open(&resolve_db_path(cli.db_path)?, cli.offline).await?;
            run_export(&session, format, output.as_deref()).await?;
        }
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
