//! libSQL-backed local store shared across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::LocalStore;
use crate::db::{
    AttendeeRepository, Database, LibSqlAttendeeRepository, LibSqlPendingResponseRepository,
    LibSqlSyncMetadataRepository, PendingResponseRepository, SyncMetadataRepository,
};
use crate::models::{Attendee, Identifier, PendingResponse, SubmissionId};
use crate::{Error, Result};

const LAST_REFRESH_KEY: &str = "last_attendee_refresh_ms";

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open the local store at the given filesystem path.
    ///
    /// A file that is not a database is quarantined and the store is reopened
    /// once. Any failure left after that is reported as `StorageUnavailable`.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        let db = match Self::open_database(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable: {}. Quarantining and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)
                    .map_err(|error| Self::unavailable(&db_path, &error))?;
                Self::open_database(&db_path)
                    .await
                    .map_err(|error| Self::unavailable(&db_path, &error))?
            }
            Err(error) => return Err(Self::unavailable(&db_path, &error)),
        };

        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()
            .await
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location of the store, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn open_database(db_path: &Path) -> Result<Database> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Database::open(db_path).await
    }

    fn unavailable(db_path: &Path, error: &Error) -> Error {
        Error::StorageUnavailable(format!("{}: {error}", db_path.display()))
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        if db_path.exists() {
            let timestamp = Utc::now().timestamp_millis();
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale local store file {}", path.display());
            }
        }

        Ok(())
    }
}

impl LocalStore for DatabaseService {
    async fn get_attendee(&self, identifier: &Identifier) -> Result<Option<Attendee>> {
        let db = self.db.lock().await;
        let repo = LibSqlAttendeeRepository::new(db.connection());
        repo.get(identifier).await
    }

    async fn put_attendee(&self, attendee: &Attendee) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlAttendeeRepository::new(db.connection());
        repo.upsert(attendee).await
    }

    async fn put_attendees(&self, attendees: &[Attendee]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlAttendeeRepository::new(db.connection());
        repo.upsert_batch(attendees).await
    }

    async fn list_attendees(&self) -> Result<Vec<Attendee>> {
        let db = self.db.lock().await;
        let repo = LibSqlAttendeeRepository::new(db.connection());
        repo.list().await
    }

    async fn count_attendees(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlAttendeeRepository::new(db.connection());
        repo.count().await
    }

    async fn put_pending_response(&self, response: &PendingResponse) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPendingResponseRepository::new(db.connection());
        repo.insert(response).await
    }

    async fn list_pending_responses(&self) -> Result<Vec<PendingResponse>> {
        let db = self.db.lock().await;
        let repo = LibSqlPendingResponseRepository::new(db.connection());
        repo.list().await
    }

    async fn delete_pending_response(&self, submission_id: &SubmissionId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlPendingResponseRepository::new(db.connection());
        repo.delete(submission_id).await
    }

    async fn count_pending_responses(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlPendingResponseRepository::new(db.connection());
        repo.count().await
    }

    async fn record_attendee_refresh(&self, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncMetadataRepository::new(db.connection());
        repo.set(LAST_REFRESH_KEY, &at.timestamp_millis().to_string())
            .await
    }

    async fn last_attendee_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncMetadataRepository::new(db.connection());
        let Some(raw) = repo.get(LAST_REFRESH_KEY).await? else {
            return Ok(None);
        };
        Ok(raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis))
    }
}
