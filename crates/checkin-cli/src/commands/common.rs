use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use checkin_core::remote::SupabaseRemoteClient;
use checkin_core::resolution::{ResolutionSource, SurveyForm};
use checkin_core::sync::{DrainReport, RefreshOutcome};
use checkin_core::{
    Attendee, ConnectivityMonitor, DatabaseService, InitialSyncSignal, PendingResponse,
    RemoteBackend, RemoteClient, RemoteConfig, ResolutionConfig, ResolutionEngine, SubmitOutcome,
    SyncOrchestrator, ViewEntry,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use crate::error::CliError;

pub const ENV_DB_PATH: &str = "CHECKIN_DB_PATH";

pub type Orchestrator = SyncOrchestrator<DatabaseService, RemoteBackend>;
pub type Engine = ResolutionEngine<DatabaseService, RemoteBackend>;

/// Everything a command needs to talk to both stores.
pub struct Session {
    pub store: DatabaseService,
    pub remote: Arc<RemoteBackend>,
    pub connectivity: ConnectivityMonitor,
    /// `--offline` was given; probes must not flip the signal back online.
    pub forced_offline: bool,
}

impl Session {
    pub async fn open(db_path: &Path, forced_offline: bool) -> Result<Self, CliError> {
        let store = open_store(db_path).await?;
        let remote = Arc::new(build_remote_backend(RemoteConfig::from_env()?)?);
        let online = initial_connectivity(&remote, forced_offline).await;
        tracing::debug!(
            "Session opened at {} (remote configured: {}, online: {})",
            db_path.display(),
            remote.is_configured(),
            online
        );

        Ok(Self {
            store,
            remote,
            connectivity: ConnectivityMonitor::new(online),
            forced_offline,
        })
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::new(SyncOrchestrator::new(
            self.store.clone(),
            Arc::clone(&self.remote),
            self.connectivity.clone(),
        ))
    }

    pub fn engine(&self, initial_sync: InitialSyncSignal) -> Engine {
        ResolutionEngine::new(
            self.store.clone(),
            Arc::clone(&self.remote),
            self.connectivity.clone(),
            initial_sync,
            ResolutionConfig::default(),
        )
    }
}

/// Run the start-up attendee refresh in the background, completing `signal`.
pub fn spawn_initial_refresh(
    orchestrator: Arc<Orchestrator>,
    signal: InitialSyncSignal,
) -> JoinHandle<RefreshOutcome> {
    tokio::spawn(async move { orchestrator.initial_refresh(&signal).await })
}

/// Re-probe the remote store every `interval` and publish the result.
pub fn spawn_connectivity_probe(
    remote: Arc<RemoteBackend>,
    connectivity: ConnectivityMonitor,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reachable = remote.is_reachable().await;
            connectivity.set_online(reachable);
        }
    })
}

pub async fn open_store(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path).await?)
}

pub fn build_remote_backend(config: Option<RemoteConfig>) -> Result<RemoteBackend, CliError> {
    let client = config
        .map(|config| SupabaseRemoteClient::new(&config))
        .transpose()
        .map_err(checkin_core::Error::from)?;
    Ok(RemoteBackend::from(client))
}

pub async fn initial_connectivity(remote: &RemoteBackend, forced_offline: bool) -> bool {
    if forced_offline || !remote.is_configured() {
        return false;
    }
    remote.is_reachable().await
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("checkin").join("checkin.db"))
        .ok_or_else(|| {
            CliError::Config(format!(
                "Failed to resolve a data directory; pass --db-path or set {ENV_DB_PATH}"
            ))
        })
}

#[derive(Debug, Serialize)]
pub struct PendingListItem {
    pub submission_id: String,
    pub identifier: String,
    pub display_name: String,
    pub phone: String,
    pub answer1: String,
    pub answer2: String,
    pub submitted_at: String,
    pub relative_time: String,
}

pub fn pending_to_list_item(response: &PendingResponse, now_ms: i64) -> PendingListItem {
    let submitted_ms = response.submitted_at_local.timestamp_millis();
    PendingListItem {
        submission_id: response.submission_id.to_string(),
        identifier: response.identifier.to_string(),
        display_name: response.display_name.clone(),
        phone: response.phone.clone(),
        answer1: response.answer1.clone(),
        answer2: response.answer2.clone(),
        submitted_at: format_timestamp(Some(response.submitted_at_local)),
        relative_time: format_relative_time(submitted_ms, now_ms),
    }
}

pub fn format_attendee_lines(attendees: &[Attendee]) -> Vec<String> {
    attendees
        .iter()
        .map(|attendee| {
            let mut line = format!(
                "{}  {}  {}",
                attendee.identifier, attendee.display_name, attendee.phone
            );
            if let Some(email) = &attendee.email {
                line.push_str("  ");
                line.push_str(email);
            }
            line
        })
        .collect()
}

pub fn format_pending_lines(pending: &[PendingResponse], now_ms: i64) -> Vec<String> {
    pending
        .iter()
        .map(|response| {
            format!(
                "{}  {}  {} / {}  ({})",
                response.identifier,
                response.display_name,
                response.answer1,
                response.answer2,
                format_relative_time(response.submitted_at_local.timestamp_millis(), now_ms)
            )
        })
        .collect()
}

pub fn format_view_lines(entries: &[ViewEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  [{}]  {}  {}  {} / {}",
                format_timestamp(entry.timestamp),
                entry.origin.as_str(),
                entry.identifier,
                entry.display_name,
                entry.answer1,
                entry.answer2
            )
        })
        .collect()
}

pub fn format_form_lines(form: &SurveyForm, source: ResolutionSource) -> Vec<String> {
    let source = match source {
        ResolutionSource::Cache => "local cache",
        ResolutionSource::InitialSync => "start-up sync",
        ResolutionSource::Remote => "remote store",
    };
    vec![
        format!("Attendee {} (from {source})", form.attendee.identifier),
        format!("  Name:  {}", form.display_name),
        format!("  Phone: {}", form.phone),
    ]
}

pub fn describe_not_found(identifier: &str) -> String {
    if identifier.is_empty() {
        "Scanned code does not contain an identifier".to_string()
    } else {
        format!("No attendee found for {identifier}")
    }
}

pub fn describe_refresh(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Offline => "Attendee refresh skipped: offline".to_string(),
        RefreshOutcome::Ok { count } => format!("Attendee cache refreshed ({count} records)"),
        RefreshOutcome::Failed { error } => format!("Attendee refresh failed: {error}"),
        RefreshOutcome::AlreadyRunning => "Attendee refresh already in progress".to_string(),
    }
}

pub fn describe_drain(report: &DrainReport) -> String {
    if report.skipped {
        return "Queue drain already in progress".to_string();
    }
    if report.attempted == 0 {
        return "No queued responses to send".to_string();
    }
    format!(
        "Sent {} queued responses: {} saved, {} already stored, {} still queued",
        report.attempted, report.inserted, report.duplicates, report.retained
    )
}

pub fn describe_submit(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::SavedRemote => "Response saved".to_string(),
        SubmitOutcome::SavedRemoteDuplicate => "Response was already saved".to_string(),
        SubmitOutcome::SavedLocal => "Response saved offline; it will sync later".to_string(),
        SubmitOutcome::NotSaved { reason } => format!("Response could not be saved: {reason}"),
    }
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "-".to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
