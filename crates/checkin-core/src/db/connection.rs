//! libSQL handle for the local store

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::{Error, Result};

/// Best-effort tuning; WAL is rejected by in-memory databases.
const PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL;",
    "PRAGMA synchronous = NORMAL;",
    "PRAGMA busy_timeout = 5000;",
];

/// An open, migrated local store.
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open (or create) the store file at `path` and migrate it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let location = path.as_ref().to_string_lossy().to_string();
        Self::prepare(Builder::new_local(&location).build().await?).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::prepare(Builder::new_local(":memory:").build().await?).await
    }

    async fn prepare(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        for pragma in PRAGMAS {
            conn.execute(pragma, ()).await.ok();
        }
        migrations::run(&conn).await?;
        Ok(Self { _db: db, conn })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `statements` as one unit: all commit or none do.
    pub(crate) async fn in_transaction(conn: &Connection, statements: Vec<Statement>) -> Result<()> {
        conn.execute("BEGIN IMMEDIATE", ()).await?;

        let mut outcome = Ok(());
        for statement in statements {
            if let Err(error) = conn.execute(statement.sql, statement.params).await {
                outcome = Err(Error::from(error));
                break;
            }
        }
        if outcome.is_ok() {
            outcome = conn.execute("COMMIT", ()).await.map(|_| ()).map_err(Error::from);
        }
        if outcome.is_err() {
            conn.execute("ROLLBACK", ()).await.ok();
        }
        outcome
    }
}

/// One parameterized statement queued for a transaction.
pub(crate) struct Statement {
    pub sql: &'static str,
    pub params: Vec<libsql::Value>,
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    async fn metadata_rows(conn: &Connection) -> i64 {
        let mut rows = conn
            .query("SELECT COUNT(*) FROM sync_metadata", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_is_created_and_reopened() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("checkin.db");

        {
            let db = Database::open(&db_path).await.unwrap();
            db.connection()
                .execute(
                    "INSERT INTO sync_metadata (key, value) VALUES ('k', 'v')",
                    (),
                )
                .await
                .unwrap();
        }
        assert!(db_path.exists());

        let reopened = Database::open(&db_path).await.unwrap();
        assert_eq!(metadata_rows(reopened.connection()).await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transaction_commits_every_statement() {
        let db = Database::open_in_memory().await.unwrap();
        let statements = ["a", "b"]
            .into_iter()
            .map(|key| Statement {
                sql: "INSERT INTO sync_metadata (key, value) VALUES (?1, '1')",
                params: vec![key.into()],
            })
            .collect();

        Database::in_transaction(db.connection(), statements)
            .await
            .unwrap();
        assert_eq!(metadata_rows(db.connection()).await, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transaction_rolls_back_on_failure() {
        let db = Database::open_in_memory().await.unwrap();
        let statements = vec![
            Statement {
                sql: "INSERT INTO sync_metadata (key, value) VALUES (?1, ?2)",
                params: vec!["a".into(), "1".into()],
            },
            Statement {
                sql: "INSERT INTO missing_table (key) VALUES (?1)",
                params: vec!["b".into()],
            },
        ];

        assert!(Database::in_transaction(db.connection(), statements)
            .await
            .is_err());
        assert_eq!(metadata_rows(db.connection()).await, 0);
    }
}
