//! Access to the authoritative remote store.
//!
//! The core only depends on the [`RemoteClient`] contract and its error
//! taxonomy: not-found is `Ok(None)`, a uniqueness violation on insert is
//! [`InsertOutcome::Conflict`], everything else is [`RemoteError`].

mod supabase;

use std::future::Future;

use thiserror::Error;

use crate::models::{Attendee, Identifier, PendingResponse, RemoteResponse};

pub use supabase::SupabaseRemoteClient;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure, non-success status, or no remote configured
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unexpected remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result of a successful insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The row already exists remotely; the data is durable either way.
    Conflict,
}

/// Operations against the remote attendee and response collections.
pub trait RemoteClient: Send + Sync + 'static {
    /// Point lookup of one attendee.
    fn fetch_attendee(
        &self,
        identifier: &Identifier,
    ) -> impl Future<Output = RemoteResult<Option<Attendee>>> + Send;

    /// Snapshot of the whole attendee collection.
    fn fetch_all_attendees(&self) -> impl Future<Output = RemoteResult<Vec<Attendee>>> + Send;

    /// Insert one response, reporting an existing row as `Conflict`.
    fn insert_response(
        &self,
        response: &PendingResponse,
    ) -> impl Future<Output = RemoteResult<InsertOutcome>> + Send;

    /// Most recent responses first. Failures yield an empty list.
    fn fetch_recent_responses(
        &self,
        limit: usize,
    ) -> impl Future<Output = Vec<RemoteResponse>> + Send;

    /// Cheap probe used to drive the connectivity signal.
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Client used when no remote store is configured; every call is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

const DISCONNECTED_MESSAGE: &str = "no remote store configured";

impl RemoteClient for Disconnected {
    async fn fetch_attendee(&self, _identifier: &Identifier) -> RemoteResult<Option<Attendee>> {
        Err(RemoteError::Unavailable(DISCONNECTED_MESSAGE.to_string()))
    }

    async fn fetch_all_attendees(&self) -> RemoteResult<Vec<Attendee>> {
        Err(RemoteError::Unavailable(DISCONNECTED_MESSAGE.to_string()))
    }

    async fn insert_response(&self, _response: &PendingResponse) -> RemoteResult<InsertOutcome> {
        Err(RemoteError::Unavailable(DISCONNECTED_MESSAGE.to_string()))
    }

    async fn fetch_recent_responses(&self, _limit: usize) -> Vec<RemoteResponse> {
        Vec::new()
    }

    async fn is_reachable(&self) -> bool {
        false
    }
}

/// Remote client selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum RemoteBackend {
    Supabase(SupabaseRemoteClient),
    Disconnected(Disconnected),
}

impl RemoteBackend {
    /// Whether a real remote store is behind this backend.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Supabase(_))
    }
}

impl From<Option<SupabaseRemoteClient>> for RemoteBackend {
    fn from(value: Option<SupabaseRemoteClient>) -> Self {
        value.map_or(Self::Disconnected(Disconnected), Self::Supabase)
    }
}

impl RemoteClient for RemoteBackend {
    async fn fetch_attendee(&self, identifier: &Identifier) -> RemoteResult<Option<Attendee>> {
        match self {
            Self::Supabase(client) => client.fetch_attendee(identifier).await,
            Self::Disconnected(client) => client.fetch_attendee(identifier).await,
        }
    }

    async fn fetch_all_attendees(&self) -> RemoteResult<Vec<Attendee>> {
        match self {
            Self::Supabase(client) => client.fetch_all_attendees().await,
            Self::Disconnected(client) => client.fetch_all_attendees().await,
        }
    }

    async fn insert_response(&self, response: &PendingResponse) -> RemoteResult<InsertOutcome> {
        match self {
            Self::Supabase(client) => client.insert_response(response).await,
            Self::Disconnected(client) => client.insert_response(response).await,
        }
    }

    async fn fetch_recent_responses(&self, limit: usize) -> Vec<RemoteResponse> {
        match self {
            Self::Supabase(client) => client.fetch_recent_responses(limit).await,
            Self::Disconnected(client) => client.fetch_recent_responses(limit).await,
        }
    }

    async fn is_reachable(&self) -> bool {
        match self {
            Self::Supabase(client) => client.is_reachable().await,
            Self::Disconnected(client) => client.is_reachable().await,
        }
    }
}
