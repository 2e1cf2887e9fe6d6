//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{Attendee, Identifier, PendingResponse, RemoteResponse, SubmissionId};
use crate::remote::{InsertOutcome, RemoteClient, RemoteError, RemoteResult};
use crate::services::LocalStore;
use crate::{Error, Result};

/// Next result handed out by [`FakeRemote::insert_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedInsert {
    Inserted,
    Conflict,
    Unavailable,
}

#[derive(Default)]
struct FakeRemoteState {
    attendees: Mutex<Vec<Attendee>>,
    responses: Mutex<Vec<RemoteResponse>>,
    inserted: Mutex<Vec<PendingResponse>>,
    insert_script: Mutex<VecDeque<ScriptedInsert>>,
    latency: Mutex<Duration>,
    unreachable: AtomicBool,
    fetch_all_fails: AtomicBool,
    point_lookups: AtomicUsize,
    fetch_all_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

/// In-memory remote store with call counters and programmable failures.
///
/// Unscripted inserts succeed once per submission id and report `Conflict`
/// for repeats, like the real uniqueness constraint.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<FakeRemoteState>,
}

impl FakeRemote {
    pub fn with_attendees(attendees: Vec<Attendee>) -> Self {
        let remote = Self::default();
        *remote.state.attendees.lock().unwrap() = attendees;
        remote
    }

    pub fn set_responses(&self, responses: Vec<RemoteResponse>) {
        *self.state.responses.lock().unwrap() = responses;
    }

    pub fn push_insert_outcome(&self, outcome: ScriptedInsert) {
        self.state.insert_script.lock().unwrap().push_back(outcome);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().unwrap() = latency;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_fetch_all_fails(&self, fails: bool) {
        self.state.fetch_all_fails.store(fails, Ordering::SeqCst);
    }

    pub fn point_lookups(&self) -> usize {
        self.state.point_lookups.load(Ordering::SeqCst)
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.state.fetch_all_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.state.insert_calls.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<PendingResponse> {
        self.state.inserted.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) {
        let latency = *self.state.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_reachable(&self) -> RemoteResult<()> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("fake remote unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl RemoteClient for FakeRemote {
    async fn fetch_attendee(&self, identifier: &Identifier) -> RemoteResult<Option<Attendee>> {
        self.state.point_lookups.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_reachable()?;
        Ok(self
            .state
            .attendees
            .lock()
            .unwrap()
            .iter()
            .find(|attendee| &attendee.identifier == identifier)
            .cloned())
    }

    async fn fetch_all_attendees(&self) -> RemoteResult<Vec<Attendee>> {
        self.state.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_reachable()?;
        if self.state.fetch_all_fails.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("page 2 failed".into()));
        }
        Ok(self.state.attendees.lock().unwrap().clone())
    }

    async fn insert_response(&self, response: &PendingResponse) -> RemoteResult<InsertOutcome> {
        self.state.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_reachable()?;

        let scripted = self.state.insert_script.lock().unwrap().pop_front();
        match scripted {
            Some(ScriptedInsert::Unavailable) => {
                Err(RemoteError::Unavailable("scripted failure".into()))
            }
            Some(ScriptedInsert::Conflict) => Ok(InsertOutcome::Conflict),
            Some(ScriptedInsert::Inserted) | None => {
                let mut inserted = self.state.inserted.lock().unwrap();
                if inserted
                    .iter()
                    .any(|existing| existing.submission_id == response.submission_id)
                {
                    return Ok(InsertOutcome::Conflict);
                }
                inserted.push(response.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn fetch_recent_responses(&self, limit: usize) -> Vec<RemoteResponse> {
        if self.check_reachable().is_err() {
            return Vec::new();
        }
        self.state
            .responses
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn is_reachable(&self) -> bool {
        self.check_reachable().is_ok()
    }
}

/// Local store whose engine can never be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

fn unavailable<T>() -> Result<T> {
    Err(Error::StorageUnavailable("storage disabled".into()))
}

impl LocalStore for FailingStore {
    async fn get_attendee(&self, _identifier: &Identifier) -> Result<Option<Attendee>> {
        unavailable()
    }

    async fn put_attendee(&self, _attendee: &Attendee) -> Result<()> {
        unavailable()
    }

    async fn put_attendees(&self, _attendees: &[Attendee]) -> Result<usize> {
        unavailable()
    }

    async fn list_attendees(&self) -> Result<Vec<Attendee>> {
        unavailable()
    }

    async fn count_attendees(&self) -> Result<usize> {
        unavailable()
    }

    async fn put_pending_response(&self, _response: &PendingResponse) -> Result<()> {
        unavailable()
    }

    async fn list_pending_responses(&self) -> Result<Vec<PendingResponse>> {
        unavailable()
    }

    async fn delete_pending_response(&self, _submission_id: &SubmissionId) -> Result<bool> {
        unavailable()
    }

    async fn count_pending_responses(&self) -> Result<usize> {
        unavailable()
    }

    async fn record_attendee_refresh(&self, _at: DateTime<Utc>) -> Result<()> {
        unavailable()
    }

    async fn last_attendee_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        unavailable()
    }
}
