//! Attendee refresh and pending-response drain against the remote store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::connectivity::{ConnectivityMonitor, InitialSyncSignal};
use crate::remote::{InsertOutcome, RemoteClient};
use crate::services::LocalStore;
use crate::Result;

/// Result of one attendee refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No connectivity; nothing was fetched or written.
    Offline,
    /// The remote snapshot was written to the local cache.
    Ok { count: usize },
    /// Fetch or write failed; the local cache is unchanged.
    Failed { error: String },
    /// Another refresh was already in flight.
    AlreadyRunning,
}

impl RefreshOutcome {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records in the snapshot that were sent
    pub attempted: usize,
    /// Accepted by the remote store and removed locally
    pub inserted: usize,
    /// Already stored remotely and removed locally
    pub duplicates: usize,
    /// Left in the queue for a later pass
    pub retained: usize,
    /// Another drain was already in flight; nothing was attempted
    pub skipped: bool,
}

impl DrainReport {
    const fn skipped_pass() -> Self {
        Self {
            attempted: 0,
            inserted: 0,
            duplicates: 0,
            retained: 0,
            skipped: true,
        }
    }

    /// Records confirmed durable server-side during this pass.
    #[must_use]
    pub const fn confirmed(&self) -> usize {
        self.inserted + self.duplicates
    }
}

/// Outcome of a combined refresh-then-drain pass.
#[derive(Debug)]
pub struct SyncSummary {
    pub refresh: RefreshOutcome,
    pub drain: Result<DrainReport>,
}

/// Clears the running flag of a single-flight operation when dropped.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Keeps the local store consistent with the remote store.
pub struct SyncOrchestrator<S, R> {
    store: S,
    remote: Arc<R>,
    connectivity: ConnectivityMonitor,
    refreshing: AtomicBool,
    /// Bumped when a refresh finishes, carrying whether it succeeded.
    refresh_finished: watch::Sender<Option<bool>>,
    draining: AtomicBool,
}

impl<S: LocalStore, R: RemoteClient> SyncOrchestrator<S, R> {
    pub fn new(store: S, remote: Arc<R>, connectivity: ConnectivityMonitor) -> Self {
        let (refresh_finished, _receiver) = watch::channel(None);
        Self {
            store,
            remote,
            connectivity,
            refreshing: AtomicBool::new(false),
            refresh_finished,
            draining: AtomicBool::new(false),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Replace the attendee cache contents with the remote snapshot.
    pub async fn refresh_attendees(&self) -> RefreshOutcome {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping attendee refresh while offline");
            return RefreshOutcome::Offline;
        }

        let outcome = {
            let Some(_guard) = RunGuard::acquire(&self.refreshing) else {
                tracing::debug!("Attendee refresh already in flight");
                return RefreshOutcome::AlreadyRunning;
            };
            self.replace_attendee_cache().await
        };
        // Sent after the guard drops; anyone who saw it held is subscribed.
        self.refresh_finished.send_replace(Some(outcome.is_ok()));
        outcome
    }

    async fn replace_attendee_cache(&self) -> RefreshOutcome {
        let attendees = match self.remote.fetch_all_attendees().await {
            Ok(attendees) => attendees,
            Err(error) => {
                tracing::warn!("Attendee refresh failed: {}", error);
                return RefreshOutcome::Failed {
                    error: error.to_string(),
                };
            }
        };

        let count = match self.store.put_attendees(&attendees).await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!("Could not cache {} attendees: {}", attendees.len(), error);
                return RefreshOutcome::Failed {
                    error: error.to_string(),
                };
            }
        };

        if let Err(error) = self.store.record_attendee_refresh(Utc::now()).await {
            tracing::warn!("Could not record attendee refresh time: {}", error);
        }

        tracing::info!("Attendee cache refreshed with {} records", count);
        RefreshOutcome::Ok { count }
    }

    /// Forward every queued response to the remote store.
    ///
    /// Works from a snapshot taken at the start of the call and never stops
    /// early. Accepted and duplicate records are removed; unavailable ones stay.
    pub async fn drain_pending(&self) -> Result<DrainReport> {
        let Some(_guard) = RunGuard::acquire(&self.draining) else {
            tracing::debug!("Pending drain already in flight");
            return Ok(DrainReport::skipped_pass());
        };

        let mut snapshot = self.store.list_pending_responses().await?;
        snapshot.sort_by(|a, b| {
            a.submitted_at_local
                .cmp(&b.submitted_at_local)
                .then_with(|| a.submission_id.cmp(&b.submission_id))
        });

        let mut report = DrainReport::default();
        for response in &snapshot {
            report.attempted += 1;

            let outcome = match self.remote.insert_response(response).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::warn!(
                        "Keeping {} queued: {}",
                        response.submission_id,
                        error
                    );
                    report.retained += 1;
                    continue;
                }
            };

            if let Err(error) = self
                .store
                .delete_pending_response(&response.submission_id)
                .await
            {
                tracing::warn!(
                    "{} reached the remote store but could not be dequeued: {}",
                    response.submission_id,
                    error
                );
                report.retained += 1;
                continue;
            }

            match outcome {
                InsertOutcome::Inserted => report.inserted += 1,
                InsertOutcome::Conflict => {
                    tracing::debug!("{} was already stored remotely", response.submission_id);
                    report.duplicates += 1;
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                "Drained pending responses: {} sent, {} duplicate, {} kept",
                report.inserted,
                report.duplicates,
                report.retained
            );
        }
        Ok(report)
    }

    /// Start-up refresh; always completes `signal`, whatever the outcome.
    ///
    /// When another refresh is already running, `signal` completes with that
    /// refresh's result once it finishes.
    pub async fn initial_refresh(&self, signal: &InitialSyncSignal) -> RefreshOutcome {
        let mut finished = self.refresh_finished.subscribe();
        let outcome = self.refresh_attendees().await;
        let ok = match &outcome {
            RefreshOutcome::AlreadyRunning => {
                finished.changed().await.is_ok() && *finished.borrow_and_update() == Some(true)
            }
            other => other.is_ok(),
        };
        signal.complete(ok);
        outcome
    }

    /// Refresh attendees, then drain the pending queue.
    pub async fn sync_now(&self) -> SyncSummary {
        let refresh = self.refresh_attendees().await;
        let drain = self.drain_pending().await;
        SyncSummary { refresh, drain }
    }
}

/// Run [`SyncOrchestrator::sync_now`] on every offline to online transition.
///
/// Ordering relative to an in-flight scan cycle is not defined.
pub fn spawn_reconnect_sync<S, R>(orchestrator: Arc<SyncOrchestrator<S, R>>) -> JoinHandle<()>
where
    S: LocalStore,
    R: RemoteClient,
{
    let mut receiver = orchestrator.connectivity().subscribe();
    tokio::spawn(async move {
        let mut was_online = *receiver.borrow_and_update();
        while receiver.changed().await.is_ok() {
            let online = *receiver.borrow_and_update();
            if online && !was_online {
                tracing::info!("Connectivity restored, syncing");
                let summary = orchestrator.sync_now().await;
                if let Err(error) = &summary.drain {
                    tracing::warn!("Reconnect drain failed: {}", error);
                }
                // Any change seen during the pass went through offline.
                if receiver.has_changed().unwrap_or(false) {
                    was_online = false;
                    continue;
                }
            }
            was_online = online;
        }
    })
}
