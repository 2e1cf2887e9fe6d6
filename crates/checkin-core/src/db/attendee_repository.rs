//! Attendee cache repository implementation

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // SQLite COUNT(*) is i64

use std::collections::HashSet;

use crate::db::connection::{Database, Statement};
use crate::error::{Error, Result};
use crate::models::{Attendee, Identifier};
use libsql::{Connection, Value};

const UPSERT_ATTENDEE: &str =
    "INSERT INTO attendees (identifier, display_name, phone, email, refreshed_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(identifier) DO UPDATE SET
         display_name = excluded.display_name,
         phone = excluded.phone,
         email = excluded.email,
         refreshed_at = excluded.refreshed_at";

/// Trait for attendee cache operations (async)
#[allow(async_fn_in_trait)]
pub trait AttendeeRepository {
    /// Get an attendee by identifier
    async fn get(&self, identifier: &Identifier) -> Result<Option<Attendee>>;

    /// Insert or overwrite one attendee
    async fn upsert(&self, attendee: &Attendee) -> Result<()>;

    /// Insert or overwrite a batch of attendees atomically, returning the
    /// number of distinct identifiers written
    async fn upsert_batch(&self, attendees: &[Attendee]) -> Result<usize>;

    /// List every cached attendee ordered by identifier
    async fn list(&self) -> Result<Vec<Attendee>>;

    /// Number of cached attendees
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `AttendeeRepository`
pub struct LibSqlAttendeeRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAttendeeRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn upsert_params(attendee: &Attendee, refreshed_at: i64) -> Vec<Value> {
        vec![
            attendee.identifier.as_str().into(),
            attendee.display_name.as_str().into(),
            attendee.phone.as_str().into(),
            attendee
                .email
                .as_deref()
                .map_or(Value::Null, |email| email.into()),
            refreshed_at.into(),
        ]
    }

    /// Parse an attendee from a database row
    fn parse_attendee(row: &libsql::Row) -> Result<Attendee> {
        let identifier: String = row.get(0)?;
        let identifier = Identifier::parse(&identifier)
            .map_err(|_| Error::Database(format!("invalid stored identifier '{identifier}'")))?;
        let email = match row.get_value(3)? {
            Value::Text(email) => Some(email),
            _ => None,
        };

        Ok(Attendee {
            identifier,
            display_name: row.get(1)?,
            phone: row.get(2)?,
            email,
        })
    }
}

impl AttendeeRepository for LibSqlAttendeeRepository<'_> {
    async fn get(&self, identifier: &Identifier) -> Result<Option<Attendee>> {
        let mut rows = self
            .conn
            .query(
                "SELECT identifier, display_name, phone, email FROM attendees WHERE identifier = ?1",
                [identifier.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_attendee(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, attendee: &Attendee) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(UPSERT_ATTENDEE, Self::upsert_params(attendee, now))
            .await?;
        Ok(())
    }

    async fn upsert_batch(&self, attendees: &[Attendee]) -> Result<usize> {
        if attendees.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let statements = attendees
            .iter()
            .map(|attendee| Statement {
                sql: UPSERT_ATTENDEE,
                params: Self::upsert_params(attendee, now),
            })
            .collect();

        Database::in_transaction(self.conn, statements).await?;
        let distinct = attendees
            .iter()
            .map(|attendee| &attendee.identifier)
            .collect::<HashSet<_>>();
        Ok(distinct.len())
    }

    async fn list(&self) -> Result<Vec<Attendee>> {
        let mut rows = self
            .conn
            .query(
                "SELECT identifier, display_name, phone, email FROM attendees ORDER BY identifier",
                (),
            )
            .await?;

        let mut attendees = Vec::new();
        while let Some(row) = rows.next().await? {
            attendees.push(Self::parse_attendee(&row)?);
        }
        Ok(attendees)
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM attendees", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }
}
