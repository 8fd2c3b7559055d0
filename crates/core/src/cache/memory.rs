//! In-process cache with per-entry expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::RwLock;

use super::{CacheGateway, Error};

struct MemoryEntry {
    value: Bytes,
    /// `None` when `now + ttl` is past the end of `Instant`'s range.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory cache.
///
/// Uses a simple HashMap with tokio RwLock for concurrent access. Clones
/// share the same storage.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

#[async_trait::async_trait]
impl CacheGateway for MemoryCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<Bytes>, Error> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(fingerprint)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, fingerprint: &str, value: Bytes, ttl: Duration) -> Result<(), Error> {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries
            .write()
            .await
            .insert(fingerprint.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache
            .set("fanout::abc", Bytes::from_static(b"cached-data"), Duration::from_secs(60))
            .await
            .unwrap();

        let value = cache.get("fanout::abc").await.unwrap();
        assert_eq!(value.as_deref(), Some(&b"cached-data"[..]));
    }

    #[tokio::test]
    async fn test_miss() {
        let cache = MemoryCache::new();
        assert!(cache.get("fanout::missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache
            .set("fanout::old", Bytes::from_static(b"stale"), Duration::ZERO)
            .await
            .unwrap();

        assert!(cache.get("fanout::old").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_is_stored() {
        let cache = MemoryCache::new();
        cache
            .set("fanout::forever", Bytes::from_static(b"kept"), Duration::MAX)
            .await
            .unwrap();

        assert_eq!(cache.get("fanout::forever").await.unwrap().as_deref(), Some(&b"kept"[..]));
        assert_eq!(cache.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache
            .set("fanout::k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(other.get("fanout::k").await.unwrap().is_some());
        assert_eq!(other.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_independent_keys() {
        let cache = MemoryCache::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("fanout::{i}");
                cache
                    .set(&key, Bytes::from(i.to_string()), Duration::from_secs(60))
                    .await
                    .unwrap();
                cache.get(&key).await.unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, Bytes::from(i.to_string()));
        }
        assert_eq!(cache.len().await, 32);
    }
}
