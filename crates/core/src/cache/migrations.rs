//! Schema versioning for the SQLite cache.
//!
//! Each step is recorded in `fetch_cache_schema` once applied; opening a
//! database applies the steps it has not seen yet, each in its own
//! transaction.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "fetch_cache", sql: include_str!("../../migrations/001_fetch_cache.sql") },
    Migration {
        version: 2,
        name: "fetch_cache_expiry_index",
        sql: include_str!("../../migrations/002_fetch_cache_expiry_index.sql"),
    },
];

/// Latest schema version this build knows about.
pub const SCHEMA_VERSION: i64 = 2;

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM fetch_cache_schema", [], |row| row.get(0))?;
    Ok(version)
}

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step whose SQL failed, or
/// `Error::Database` if the ledger itself cannot be read or written.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fetch_cache_schema (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current = schema_version(conn)?;

        for step in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(step.sql)
                .map_err(|e| Error::MigrationFailed(format!("{:03}_{}: {}", step.version, step.name, e)))?;
            tx.execute(
                "INSERT INTO fetch_cache_schema (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![step.version, step.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version = step.version, name = step.name, "applied cache schema step");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn version(conn: &Connection) -> i64 {
        conn.call(|conn| -> Result<i64, Error> { schema_version(conn) })
            .await
            .unwrap()
    }

    #[test]
    fn test_schema_version_matches_last_step() {
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(SCHEMA_VERSION));
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[tokio::test]
    async fn test_fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        assert_eq!(version(&conn).await, SCHEMA_VERSION);

        let index_exists: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='index' AND name='idx_fetch_cache_expires_at')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert!(index_exists);
    }

    #[tokio::test]
    async fn test_rerun_applies_nothing() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let rows: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM fetch_cache_schema", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_partial_schema_is_completed() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| -> Result<(), Error> {
            conn.execute_batch(
                "CREATE TABLE fetch_cache_schema (version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL)",
            )?;
            conn.execute_batch(MIGRATIONS[0].sql)?;
            conn.execute(
                "INSERT INTO fetch_cache_schema VALUES (1, 'fetch_cache', 'earlier')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        assert_eq!(version(&conn).await, SCHEMA_VERSION);
    }
}
