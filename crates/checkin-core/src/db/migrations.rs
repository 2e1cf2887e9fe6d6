//! Versioned schema migrations for the local store

use libsql::Connection;

use super::connection::{Database, Statement};
use crate::error::Result;

/// Schema steps in ascending version order; each runs in its own transaction.
const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        // Attendee cache, mirrored wholesale from the remote store
        "CREATE TABLE IF NOT EXISTS attendees (
            identifier TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            refreshed_at INTEGER NOT NULL
        )",
        // Survey responses not yet confirmed by the remote store
        "CREATE TABLE IF NOT EXISTS pending_responses (
            submission_id TEXT PRIMARY KEY,
            identifier TEXT NOT NULL,
            display_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            answer1 TEXT NOT NULL,
            answer2 TEXT NOT NULL,
            submitted_at_local INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_pending_submitted ON pending_responses(submitted_at_local)",
        "CREATE TABLE IF NOT EXISTS sync_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    ],
)];

pub const CURRENT_VERSION: i64 = 1;

/// Bring the schema up to [`CURRENT_VERSION`].
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;
    let applied = schema_version(conn).await?;

    for (version, steps) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
        let mut statements: Vec<Statement> = steps
            .iter()
            .copied()
            .map(|sql| Statement {
                sql,
                params: Vec::new(),
            })
            .collect();
        statements.push(Statement {
            sql: "INSERT INTO schema_version (version) VALUES (?1)",
            params: vec![(*version).into()],
        });

        Database::in_transaction(conn, statements).await?;
        tracing::info!("Migrated local store to schema version {version}");
    }

    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)?),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use libsql::Builder;

    use super::*;

    async fn memory_connection() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_names(conn: &Connection) -> Vec<String> {
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            names.push(row.get::<String>(0).unwrap());
        }
        names
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_store_reaches_current_version() {
        let conn = memory_connection().await;
        run(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), CURRENT_VERSION);
        assert_eq!(
            table_names(&conn).await,
            vec![
                "attendees",
                "pending_responses",
                "schema_version",
                "sync_metadata"
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rerunning_is_a_no_op() {
        let conn = memory_connection().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT COUNT(*) FROM schema_version", ())
            .await
            .unwrap();
        let applied = rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap();
        assert_eq!(applied, 1);
    }
}
