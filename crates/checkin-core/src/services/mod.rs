//! Service layer shared by the sync orchestrator, the resolution engine and clients.

mod database;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::models::{Attendee, Identifier, PendingResponse, SubmissionId};
use crate::Result;

pub use database::DatabaseService;

/// Durable local persistence for the attendee cache and the pending-response queue.
///
/// Every write is an idempotent upsert or delete-by-key, so concurrent callers
/// need no further coordination. Implementations report an engine that cannot
/// be opened as [`crate::Error::StorageUnavailable`].
pub trait LocalStore: Clone + Send + Sync + 'static {
    /// Look up a cached attendee.
    fn get_attendee(
        &self,
        identifier: &Identifier,
    ) -> impl Future<Output = Result<Option<Attendee>>> + Send;

    /// Insert or overwrite one attendee.
    fn put_attendee(&self, attendee: &Attendee) -> impl Future<Output = Result<()>> + Send;

    /// Insert or overwrite a batch of attendees; either every row lands or none does.
    ///
    /// Returns the number of distinct identifiers written.
    fn put_attendees(&self, attendees: &[Attendee])
        -> impl Future<Output = Result<usize>> + Send;

    /// Every cached attendee.
    fn list_attendees(&self) -> impl Future<Output = Result<Vec<Attendee>>> + Send;

    /// Number of cached attendees.
    fn count_attendees(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Queue a response for a later drain.
    fn put_pending_response(
        &self,
        response: &PendingResponse,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Queued responses. Callers sort by `submitted_at_local` when order matters.
    fn list_pending_responses(&self) -> impl Future<Output = Result<Vec<PendingResponse>>> + Send;

    /// Drop a queued response once the remote store holds it.
    fn delete_pending_response(
        &self,
        submission_id: &SubmissionId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Number of queued responses.
    fn count_pending_responses(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Remember when the attendee cache was last refreshed from the remote store.
    fn record_attendee_refresh(&self, at: DateTime<Utc>)
        -> impl Future<Output = Result<()>> + Send;

    /// When the attendee cache was last refreshed, if ever.
    fn last_attendee_refresh(&self) -> impl Future<Output = Result<Option<DateTime<Utc>>>> + Send;
}
