//! Opening the SQLite payload cache.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// Many fetch tasks write concurrently, so the journal runs in WAL mode.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA busy_timeout=5000;";

/// Persistent payload cache stored in a single SQLite table.
///
/// Queries run on tokio-rusqlite's background thread; clones share that
/// connection.
#[derive(Clone, Debug)]
pub struct SqliteCache {
    pub(crate) conn: Connection,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path` and bring its schema
    /// up to date.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the file cannot be opened and
    /// `Error::MigrationFailed` if the schema cannot be upgraded.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        let cache = Self::prepare(conn).await?;
        tracing::debug!(path = %path.display(), "opened sqlite cache");
        Ok(cache)
    }

    /// Cache backed by a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await?;
        migrations::run(&conn).await?;
        tracing::debug!(schema_version = migrations::SCHEMA_VERSION, "sqlite cache schema ready");
        Ok(Self { conn })
    }
}
