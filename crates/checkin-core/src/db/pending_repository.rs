//! Pending response queue and sync metadata repositories

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // SQLite COUNT(*) is i64

use chrono::{DateTime, Utc};
use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::{Identifier, PendingResponse, SubmissionId};

/// Trait for pending-response queue operations (async)
#[allow(async_fn_in_trait)]
pub trait PendingResponseRepository {
    /// Queue a response; an existing row with the same submission id is left untouched
    async fn insert(&self, response: &PendingResponse) -> Result<()>;

    /// List queued responses, oldest submission first
    async fn list(&self) -> Result<Vec<PendingResponse>>;

    /// Remove a queued response, returning whether a row was deleted
    async fn delete(&self, submission_id: &SubmissionId) -> Result<bool>;

    /// Number of queued responses
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `PendingResponseRepository`
pub struct LibSqlPendingResponseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPendingResponseRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_response(row: &libsql::Row) -> Result<PendingResponse> {
        let submission_id = SubmissionId::from_existing(row.get::<String>(0)?)?;
        let identifier: String = row.get(1)?;
        let identifier = Identifier::parse(&identifier)
            .map_err(|_| Error::Database(format!("invalid stored identifier '{identifier}'")))?;
        let submitted_at_ms: i64 = row.get(6)?;
        let submitted_at_local = DateTime::<Utc>::from_timestamp_millis(submitted_at_ms)
            .ok_or_else(|| Error::Database(format!("invalid timestamp {submitted_at_ms}")))?;

        Ok(PendingResponse {
            submission_id,
            identifier,
            display_name: row.get(2)?,
            phone: row.get(3)?,
            answer1: row.get(4)?,
            answer2: row.get(5)?,
            submitted_at_local,
        })
    }
}

impl PendingResponseRepository for LibSqlPendingResponseRepository<'_> {
    async fn insert(&self, response: &PendingResponse) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO pending_responses
                 (submission_id, identifier, display_name, phone, answer1, answer2, submitted_at_local)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    response.submission_id.as_str(),
                    response.identifier.as_str(),
                    response.display_name.as_str(),
                    response.phone.as_str(),
                    response.answer1.as_str(),
                    response.answer2.as_str(),
                    response.submitted_at_local.timestamp_millis(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PendingResponse>> {
        let mut rows = self
            .conn
            .query(
                "SELECT submission_id, identifier, display_name, phone, answer1, answer2, submitted_at_local
                 FROM pending_responses
                 ORDER BY submitted_at_local ASC, submission_id ASC",
                (),
            )
            .await?;

        let mut responses = Vec::new();
        while let Some(row) = rows.next().await? {
            responses.push(Self::parse_response(&row)?);
        }
        Ok(responses)
    }

    async fn delete(&self, submission_id: &SubmissionId) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM pending_responses WHERE submission_id = ?1",
                [submission_id.as_str()],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_responses", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }
}

/// Trait for small key/value sync bookkeeping (async)
#[allow(async_fn_in_trait)]
pub trait SyncMetadataRepository {
    /// Read a metadata value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a metadata value
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// libSQL implementation of `SyncMetadataRepository`
pub struct LibSqlSyncMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncMetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncMetadataRepository for LibSqlSyncMetadataRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_metadata WHERE key = ?1", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_metadata (key, value) VALUES (?1, ?2)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
