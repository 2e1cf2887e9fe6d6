//! Scan-cycle state machine: decoded payload to attendee to saved response.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;

use crate::config::ResolutionConfig;
use crate::connectivity::{ConnectivityMonitor, InitialSyncSignal};
use crate::models::{Attendee, Identifier, PendingResponse, SurveyAnswers};
use crate::remote::{InsertOutcome, RemoteClient};
use crate::services::LocalStore;
use crate::{Error, Result};

/// Position of the single active scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Idle,
    Captured,
    Resolving,
    Resolved,
    Unresolved,
    FormOpen,
    Submitting,
}

/// Which lookup tier produced the attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionSource {
    /// Already in the local cache
    Cache,
    /// Cached by the start-up refresh while the scan waited
    InitialSync,
    /// Fetched directly from the remote store and cached
    Remote,
}

/// Survey form pre-filled from the resolved attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyForm {
    pub attendee: Attendee,
    pub display_name: String,
    pub phone: String,
}

impl SurveyForm {
    fn prefilled(attendee: Attendee) -> Self {
        Self {
            display_name: attendee.display_name.clone(),
            phone: attendee.phone.clone(),
            attendee,
        }
    }
}

/// Completed survey form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveySubmission {
    pub display_name: String,
    pub phone: String,
    pub answers: SurveyAnswers,
}

impl SurveySubmission {
    /// Submit the pre-filled contact details unchanged.
    #[must_use]
    pub fn from_form(form: &SurveyForm, answers: SurveyAnswers) -> Self {
        Self {
            display_name: form.display_name.clone(),
            phone: form.phone.clone(),
            answers,
        }
    }
}

/// Result of feeding one decoded payload to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Another cycle is active; the payload was dropped.
    Ignored,
    Resolved {
        form: SurveyForm,
        source: ResolutionSource,
    },
    /// No tier produced a record; scanning has re-armed.
    NotFound { identifier: String },
}

/// Where a submitted response ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored by the remote store
    SavedRemote,
    /// The remote store already held this response
    SavedRemoteDuplicate,
    /// Queued locally for a later drain
    SavedLocal,
    /// Neither store accepted it; the response was only logged
    NotSaved { reason: String },
}

struct Cycle {
    state: ScanState,
    form: Option<SurveyForm>,
}

/// Resolves scans and records survey responses for one kiosk.
///
/// Exactly one cycle runs at a time: a scan that arrives while a cycle is
/// active is ignored.
pub struct ResolutionEngine<S, R> {
    store: S,
    remote: Arc<R>,
    connectivity: ConnectivityMonitor,
    initial_sync: InitialSyncSignal,
    config: ResolutionConfig,
    cycle: Mutex<Cycle>,
}

impl<S: LocalStore, R: RemoteClient> ResolutionEngine<S, R> {
    pub fn new(
        store: S,
        remote: Arc<R>,
        connectivity: ConnectivityMonitor,
        initial_sync: InitialSyncSignal,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            initial_sync,
            config,
            cycle: Mutex::new(Cycle {
                state: ScanState::Idle,
                form: None,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> ScanState {
        self.lock_cycle().state
    }

    /// The open survey form, if any.
    #[must_use]
    pub fn open_form(&self) -> Option<SurveyForm> {
        self.lock_cycle().form.clone()
    }

    /// Resolve a decoded scan payload to an attendee.
    ///
    /// Lookup order: local cache, then the cache again once the start-up
    /// refresh completes (bounded wait), then a direct remote lookup when
    /// online. A not-found result waits out the re-arm delay before returning.
    pub async fn scan(&self, decoded: &str) -> ScanOutcome {
        if !self.transition(&[ScanState::Idle], ScanState::Captured) {
            tracing::debug!("Scan ignored while another cycle is active");
            return ScanOutcome::Ignored;
        }

        let identifier = match Identifier::from_scan(decoded) {
            Ok(identifier) => identifier,
            Err(_) => return self.unresolved(String::new()).await,
        };
        tracing::debug!("Captured identifier {}", identifier);

        self.set_state(ScanState::Resolving);
        let Some((attendee, source)) = self.resolve(&identifier).await else {
            return self.unresolved(identifier.to_string()).await;
        };

        let form = SurveyForm::prefilled(attendee);
        {
            let mut cycle = self.lock_cycle();
            cycle.state = ScanState::Resolved;
            cycle.form = Some(form.clone());
            cycle.state = ScanState::FormOpen;
        }
        tracing::info!("Resolved {} from {:?}", identifier, source);
        ScanOutcome::Resolved { form, source }
    }

    /// Record the answers for the open form.
    ///
    /// Online submissions go straight to the remote store; anything the remote
    /// store does not accept is queued locally. Returns to idle afterwards.
    pub async fn submit(&self, submission: SurveySubmission) -> Result<SubmitOutcome> {
        let form = {
            let mut cycle = self.lock_cycle();
            if cycle.state != ScanState::FormOpen {
                return Err(Error::InvalidInput("no survey form is open".into()));
            }
            cycle.state = ScanState::Submitting;
            cycle.form.take()
        };
        let Some(form) = form else {
            self.reset();
            return Err(Error::InvalidInput("no survey form is open".into()));
        };

        let response = PendingResponse::new(
            &form.attendee,
            submission.display_name,
            submission.phone,
            submission.answers,
            Utc::now(),
        );
        let outcome = self.persist(&response).await;

        tokio::time::sleep(self.config.submit_rearm_delay).await;
        self.reset();
        Ok(outcome)
    }

    /// Close the open form without saving. Returns `false` if none was open.
    pub fn cancel(&self) -> bool {
        let mut cycle = self.lock_cycle();
        if cycle.state != ScanState::FormOpen {
            return false;
        }
        cycle.state = ScanState::Idle;
        cycle.form = None;
        true
    }

    async fn resolve(&self, identifier: &Identifier) -> Option<(Attendee, ResolutionSource)> {
        if let Some(attendee) = self.lookup_cached(identifier).await {
            return Some((attendee, ResolutionSource::Cache));
        }

        if !self.initial_sync.is_complete() {
            if self
                .initial_sync
                .wait(self.config.initial_sync_wait)
                .await
                .is_some()
            {
                if let Some(attendee) = self.lookup_cached(identifier).await {
                    return Some((attendee, ResolutionSource::InitialSync));
                }
            } else {
                tracing::debug!("Initial sync still running after the wait window");
            }
        }

        if !self.connectivity.is_online() {
            return None;
        }

        match self.remote.fetch_attendee(identifier).await {
            Ok(Some(attendee)) => {
                if let Err(error) = self.store.put_attendee(&attendee).await {
                    tracing::warn!("Could not cache attendee {}: {}", identifier, error);
                }
                Some((attendee, ResolutionSource::Remote))
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("Remote lookup of {} failed: {}", identifier, error);
                None
            }
        }
    }

    async fn lookup_cached(&self, identifier: &Identifier) -> Option<Attendee> {
        match self.store.get_attendee(identifier).await {
            Ok(attendee) => attendee,
            Err(error) => {
                tracing::warn!("Local lookup of {} failed: {}", identifier, error);
                None
            }
        }
    }

    async fn persist(&self, response: &PendingResponse) -> SubmitOutcome {
        if self.connectivity.is_online() {
            match self.remote.insert_response(response).await {
                Ok(InsertOutcome::Inserted) => return SubmitOutcome::SavedRemote,
                Ok(InsertOutcome::Conflict) => return SubmitOutcome::SavedRemoteDuplicate,
                Err(error) => {
                    tracing::warn!(
                        "Remote insert of {} failed, queueing locally: {}",
                        response.submission_id,
                        error
                    );
                }
            }
        }

        match self.store.put_pending_response(response).await {
            Ok(()) => SubmitOutcome::SavedLocal,
            Err(error) => {
                let payload = serde_json::to_string(response).unwrap_or_default();
                tracing::error!(
                    "Response could not be saved anywhere: {} payload={}",
                    error,
                    payload
                );
                SubmitOutcome::NotSaved {
                    reason: error.to_string(),
                }
            }
        }
    }

    async fn unresolved(&self, identifier: String) -> ScanOutcome {
        self.set_state(ScanState::Unresolved);
        tracing::info!("No attendee found for '{}'", identifier);
        tokio::time::sleep(self.config.rearm_delay).await;
        self.reset();
        ScanOutcome::NotFound { identifier }
    }

    fn transition(&self, from: &[ScanState], to: ScanState) -> bool {
        let mut cycle = self.lock_cycle();
        if !from.contains(&cycle.state) {
            return false;
        }
        cycle.state = to;
        true
    }

    fn set_state(&self, state: ScanState) {
        self.lock_cycle().state = state;
    }

    fn reset(&self) {
        let mut cycle = self.lock_cycle();
        cycle.state = ScanState::Idle;
        cycle.form = None;
    }

    fn lock_cycle(&self) -> std::sync::MutexGuard<'_, Cycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::services::DatabaseService;
    use crate::sync::{RefreshOutcome, SyncOrchestrator};
    use crate::test_support::{FailingStore, FakeRemote, ScriptedInsert};
    use crate::view::{build_view, Origin};

    fn fast_config() -> ResolutionConfig {
        ResolutionConfig {
            initial_sync_wait: Duration::from_millis(80),
            rearm_delay: Duration::from_millis(20),
            submit_rearm_delay: Duration::from_millis(5),
        }
    }

    fn attendee(id: &str, name: &str) -> Attendee {
        Attendee::new(Identifier::parse(id).unwrap(), name, "555-0100")
    }

    fn answers() -> SurveyAnswers {
        SurveyAnswers::new("si", "no").unwrap()
    }

    struct Harness<S> {
        engine: ResolutionEngine<S, FakeRemote>,
        remote: FakeRemote,
        store: S,
    }

    fn harness<S: LocalStore>(store: S, remote: FakeRemote, online: bool, synced: bool) -> Harness<S> {
        let signal = InitialSyncSignal::new();
        if synced {
            signal.complete(true);
        }
        let engine = ResolutionEngine::new(
            store.clone(),
            Arc::new(remote.clone()),
            ConnectivityMonitor::new(online),
            signal,
            fast_config(),
        );
        Harness {
            engine,
            remote,
            store,
        }
    }

    async fn memory_store() -> DatabaseService {
        DatabaseService::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cached_attendee_opens_prefilled_form() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        let h = harness(store, FakeRemote::default(), true, true);

        let outcome = h.engine.scan("t0001").await;

        let ScanOutcome::Resolved { form, source } = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(source, ResolutionSource::Cache);
        assert_eq!(form.display_name, "Ana");
        assert_eq!(form.phone, "555-0100");
        assert_eq!(h.engine.state(), ScanState::FormOpen);
        assert_eq!(h.remote.point_lookups(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scan_waits_for_initial_sync_before_remote_lookup() {
        let store = memory_store().await;
        let remote = FakeRemote::with_attendees(vec![attendee("T0001", "Ana")]);
        remote.set_latency(Duration::from_millis(100));

        let connectivity = ConnectivityMonitor::new(true);
        let signal = InitialSyncSignal::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::new(remote.clone()),
            connectivity.clone(),
        ));
        let engine = ResolutionEngine::new(
            store,
            Arc::new(remote.clone()),
            connectivity,
            signal.clone(),
            ResolutionConfig {
                initial_sync_wait: Duration::from_secs(3),
                ..fast_config()
            },
        );

        let refresh = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            let signal = signal.clone();
            async move { orchestrator.initial_refresh(&signal).await }
        });

        let outcome = engine.scan("t0001 ").await;

        assert!(matches!(
            outcome,
            ScanOutcome::Resolved {
                source: ResolutionSource::InitialSync,
                ..
            }
        ));
        assert_eq!(remote.point_lookups(), 0);
        assert!(refresh.await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scan_during_overlapping_refresh_avoids_remote_lookup() {
        let store = memory_store().await;
        let remote = FakeRemote::with_attendees(vec![attendee("T0001", "Ana")]);
        remote.set_latency(Duration::from_millis(150));
        let connectivity = ConnectivityMonitor::new(true);
        let signal = InitialSyncSignal::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::new(remote.clone()),
            connectivity.clone(),
        ));
        let engine = ResolutionEngine::new(
            store,
            Arc::new(remote.clone()),
            connectivity,
            signal.clone(),
            ResolutionConfig {
                initial_sync_wait: Duration::from_secs(3),
                ..fast_config()
            },
        );

        let manual = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.refresh_attendees().await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        let initial = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            let signal = signal.clone();
            async move { orchestrator.initial_refresh(&signal).await }
        });

        let outcome = engine.scan("t0001").await;

        assert!(matches!(outcome, ScanOutcome::Resolved { .. }));
        assert_eq!(remote.point_lookups(), 0);
        assert!(manual.await.unwrap().is_ok());
        assert_eq!(initial.await.unwrap(), RefreshOutcome::AlreadyRunning);
        assert_eq!(signal.outcome(), Some(true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_unknown_scan_is_not_found_after_bounded_wait() {
        let h = harness(memory_store().await, FakeRemote::default(), false, false);

        let started = Instant::now();
        let outcome = h.engine.scan("T0002-5727").await;

        assert_eq!(
            outcome,
            ScanOutcome::NotFound {
                identifier: "T0002-5727".to_string()
            }
        );
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(h.engine.state(), ScanState::Idle);
        assert_eq!(h.remote.point_lookups(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_sync_skips_the_wait() {
        let h = harness(memory_store().await, FakeRemote::default(), false, true);

        let started = Instant::now();
        let outcome = h.engine.scan("T0002-5727").await;

        assert!(matches!(outcome, ScanOutcome::NotFound { .. }));
        assert!(started.elapsed() < Duration::from_millis(80));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_lookup_result_is_cached() {
        let remote = FakeRemote::with_attendees(vec![attendee("T0005", "Eva")]);
        let h = harness(memory_store().await, remote, true, true);

        let outcome = h
            .engine
            .scan("https://event.example.com/checkin?token=t0005")
            .await;

        assert!(matches!(
            outcome,
            ScanOutcome::Resolved {
                source: ResolutionSource::Remote,
                ..
            }
        ));
        assert_eq!(h.remote.point_lookups(), 1);
        let cached = h
            .store
            .get_attendee(&Identifier::parse("T0005").unwrap())
            .await
            .unwrap();
        assert_eq!(cached, Some(attendee("T0005", "Eva")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_failure_is_treated_as_not_found() {
        let remote = FakeRemote::with_attendees(vec![attendee("T0005", "Eva")]);
        remote.set_unreachable(true);
        let h = harness(memory_store().await, remote, true, true);

        assert!(matches!(
            h.engine.scan("T0005").await,
            ScanOutcome::NotFound { .. }
        ));
        assert_eq!(h.engine.state(), ScanState::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_payload_is_not_found() {
        let h = harness(memory_store().await, FakeRemote::default(), true, true);
        assert_eq!(
            h.engine.scan("   ").await,
            ScanOutcome::NotFound {
                identifier: String::new()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_scan_is_ignored_while_form_is_open() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        store.put_attendee(&attendee("T0002", "Beto")).await.unwrap();
        let h = harness(store, FakeRemote::default(), true, true);

        assert!(matches!(
            h.engine.scan("T0001").await,
            ScanOutcome::Resolved { .. }
        ));
        assert_eq!(h.engine.scan("T0002").await, ScanOutcome::Ignored);
        assert_eq!(
            h.engine.open_form().map(|form| form.attendee.identifier),
            Some(Identifier::parse("T0001").unwrap())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_submit_goes_straight_to_remote() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        let h = harness(store, FakeRemote::default(), true, true);

        let ScanOutcome::Resolved { form, .. } = h.engine.scan("T0001").await else {
            panic!("expected resolution");
        };
        let outcome = h
            .engine
            .submit(SurveySubmission::from_form(&form, answers()))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::SavedRemote);
        assert_eq!(h.remote.inserted().len(), 1);
        assert_eq!(h.store.count_pending_responses().await.unwrap(), 0);
        assert_eq!(h.engine.state(), ScanState::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflict_on_submit_counts_as_saved() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        let remote = FakeRemote::default();
        remote.push_insert_outcome(ScriptedInsert::Conflict);
        let h = harness(store, remote, true, true);

        let ScanOutcome::Resolved { form, .. } = h.engine.scan("T0001").await else {
            panic!("expected resolution");
        };
        let outcome = h
            .engine
            .submit(SurveySubmission::from_form(&form, answers()))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::SavedRemoteDuplicate);
        assert_eq!(h.store.count_pending_responses().await.unwrap(), 0);
        assert_eq!(h.engine.state(), ScanState::Idle);
        assert_eq!(h.engine.open_form(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_submit_is_queued_and_shows_as_local() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T9999", "Ana")).await.unwrap();
        let h = harness(store, FakeRemote::default(), false, true);

        let ScanOutcome::Resolved { form, .. } = h.engine.scan("T9999").await else {
            panic!("expected resolution");
        };
        let outcome = h
            .engine
            .submit(SurveySubmission::from_form(&form, answers()))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::SavedLocal);
        assert_eq!(h.remote.insert_calls(), 0);

        let pending = h.store.list_pending_responses().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identifier.as_str(), "T9999");
        assert_eq!(pending[0].answer1, "si");
        assert_eq!(pending[0].answer2, "no");

        let view = build_view(&[], &pending);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].origin, Origin::Local);
        assert_eq!(view[0].identifier.as_str(), "T9999");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unavailable_remote_falls_back_to_queue() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        let remote = FakeRemote::default();
        remote.push_insert_outcome(ScriptedInsert::Unavailable);
        let h = harness(store, remote, true, true);

        let ScanOutcome::Resolved { form, .. } = h.engine.scan("T0001").await else {
            panic!("expected resolution");
        };
        let outcome = h
            .engine
            .submit(SurveySubmission::from_form(&form, answers()))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::SavedLocal);
        assert_eq!(h.store.count_pending_responses().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broken_store_degrades_without_failing() {
        let remote = FakeRemote::with_attendees(vec![attendee("T0001", "Ana")]);
        let h = harness(FailingStore, remote.clone(), true, true);

        let ScanOutcome::Resolved { form, source } = h.engine.scan("T0001").await else {
            panic!("expected resolution");
        };
        assert_eq!(source, ResolutionSource::Remote);

        remote.set_unreachable(true);
        let outcome = h
            .engine
            .submit(SurveySubmission::from_form(&form, answers()))
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::NotSaved { .. }));
        assert_eq!(h.engine.state(), ScanState::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_without_open_form_is_rejected() {
        let h = harness(memory_store().await, FakeRemote::default(), true, true);
        let submission = SurveySubmission {
            display_name: "Ana".into(),
            phone: "1".into(),
            answers: answers(),
        };

        assert!(matches!(
            h.engine.submit(submission).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_returns_to_idle() {
        let store = memory_store().await;
        store.put_attendee(&attendee("T0001", "Ana")).await.unwrap();
        let h = harness(store, FakeRemote::default(), true, true);

        assert!(!h.engine.cancel());
        h.engine.scan("T0001").await;
        assert!(h.engine.cancel());
        assert_eq!(h.engine.state(), ScanState::Idle);
    }
}
