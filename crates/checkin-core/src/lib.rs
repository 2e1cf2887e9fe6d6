//! checkin-core - Offline-first engine for event check-in kiosks
//!
//! This crate contains the attendee cache and pending-response queue (libSQL),
//! the Supabase remote client, the sync orchestrator, the scan resolution state
//! machine, and the merged response view used by reporting clients.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod report;
pub mod resolution;
pub mod services;
pub mod sync;
pub mod util;
pub mod view;

#[cfg(test)]
mod test_support;

pub use config::{RemoteConfig, ResolutionConfig};
pub use connectivity::{ConnectivityMonitor, InitialSyncSignal};
pub use error::{Error, Result};
pub use models::{Attendee, Identifier, PendingResponse, RemoteResponse, SubmissionId};
pub use remote::{RemoteBackend, RemoteClient};
pub use resolution::{ResolutionEngine, ScanOutcome, SubmitOutcome};
pub use services::{DatabaseService, LocalStore};
pub use sync::SyncOrchestrator;
pub use view::{build_view, Origin, ViewEntry};
