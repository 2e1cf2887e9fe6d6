use std::path::PathBuf;

use checkin_core::report::DEFAULT_REPORT_LIMIT;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "checkin")]
#[command(about = "Offline-first attendee check-in and survey kiosk")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Treat the remote store as unreachable
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refresh the attendee cache and send queued responses
    Sync,
    /// Resolve one scanned code and optionally record the survey
    Scan {
        /// Decoded QR payload (raw identifier or a URL carrying `?token=`)
        payload: String,
        /// Answer to the interest question
        #[arg(long, requires = "answer2")]
        answer1: Option<String>,
        /// Answer to the development question
        #[arg(long, requires = "answer1")]
        answer2: Option<String>,
        /// Override the pre-filled name
        #[arg(long)]
        name: Option<String>,
        /// Override the pre-filled phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Run the interactive kiosk loop, reading scans from stdin
    Kiosk,
    /// List cached attendees
    Attendees {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List responses waiting to be sent
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the dashboard summary and answer breakdowns
    Report {
        /// Number of remote responses to include
        #[arg(short, long, default_value_t = DEFAULT_REPORT_LIMIT)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the merged response view
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl From<ExportFormat> for checkin_core::export::ExportFormat {
    fn from(value: ExportFormat) -> Self {
        match value {
            ExportFormat::Csv => Self::Csv,
            ExportFormat::Json => Self::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
