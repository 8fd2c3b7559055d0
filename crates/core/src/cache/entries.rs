//! Payload reads and writes for [`SqliteCache`].

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::{params, rusqlite};

use super::{CacheGateway, Error, SqliteCache};

impl SqliteCache {
    /// Delete every expired entry, returning the number of rows removed.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let removed = conn.execute("DELETE FROM fetch_cache WHERE expires_at <= ?1", params![now])?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored rows, expired ones included.
    pub async fn count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| -> Result<i64, Error> {
                let count = conn.query_row("SELECT COUNT(*) FROM fetch_cache", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl CacheGateway for SqliteCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<Bytes>, Error> {
        let fingerprint = fingerprint.to_string();
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<Option<Bytes>, Error> {
                let mut stmt =
                    conn.prepare("SELECT value FROM fetch_cache WHERE fingerprint = ?1 AND expires_at > ?2")?;

                let result = stmt.query_row(params![fingerprint, now], |row| row.get::<_, Vec<u8>>(0));

                match result {
                    Ok(value) => Ok(Some(Bytes::from(value))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, fingerprint: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        let fingerprint = fingerprint.to_string();
        let stored_at = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = stored_at.saturating_add(ttl_ms);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO fetch_cache (fingerprint, value, stored_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(fingerprint) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at,
                        expires_at = excluded.expires_at",
                    params![fingerprint, value.as_ref(), stored_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
