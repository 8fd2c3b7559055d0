//! Look-aside cache for fetched payloads.
//!
//! The fetch path talks to a cache only through [`CacheGateway`]. Three
//! implementations are provided:
//!
//! - [`NoCache`]: always misses, used when the caller supplies no cache
//! - [`MemoryCache`]: process-local, TTL-stamped entries behind an `RwLock`
//! - [`SqliteCache`]: persistent SQLite store via tokio-rusqlite (WAL mode,
//!   numbered migrations, expiry column)
//!
//! Keys are fingerprints produced by [`fingerprint`], namespaced by a
//! caller-chosen prefix so unrelated users of one cache never collide.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::time::Duration;

use bytes::Bytes;

pub use crate::Error;

pub use connection::SqliteCache;
pub use hash::fingerprint;
pub use memory::MemoryCache;

/// Capability interface for a look-aside cache.
///
/// Implementations must tolerate concurrent `get`/`set` calls on
/// independent fingerprints from many tasks at once.
#[async_trait::async_trait]
pub trait CacheGateway: Send + Sync {
    /// Look up a fingerprint. Expired entries are reported as `None`.
    async fn get(&self, fingerprint: &str) -> Result<Option<Bytes>, Error>;

    /// Store a value under a fingerprint for `ttl`.
    async fn set(&self, fingerprint: &str, value: Bytes, ttl: Duration) -> Result<(), Error>;
}

/// Cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait::async_trait]
impl CacheGateway for NoCache {
    async fn get(&self, _fingerprint: &str) -> Result<Option<Bytes>, Error> {
        Ok(None)
    }

    async fn set(&self, _fingerprint: &str, _value: Bytes, _ttl: Duration) -> Result<(), Error> {
        Ok(())
    }
}
