//! Batch entry points.
//!
//! [`BatchFetcher::fetch_all`] fetches a set of URIs (deduplicated, keyed by
//! URI). [`BatchFetcher::fetch_identities`] fetches one URI once per client
//! identity (duplicates kept, input order preserved). Both run their tasks
//! on a [`WorkerPool`], consult the cache before any network work, and never
//! fail: per-target problems show up only as sentinel payloads.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use fanout_core::{CacheGateway, Error, FetcherConfig, NoCache};

use crate::aggregate::{AggregateOptions, ResultMap, aggregate_identities, aggregate_targets};
use crate::fetch::DirectFetch;
use crate::outcome::{FetchOutcome, Target};
use crate::pool::WorkerPool;
use crate::render::{ProcessRenderer, Renderer};
use crate::strategy::{FetchStrategy, RenderedFetch};

/// Cache-aside wrapper around one strategy call.
///
/// A hit short-circuits the fetch. Only successes are written back. Cache
/// failures are logged and treated as a miss.
pub async fn fetch_through_cache(
    cache: &dyn CacheGateway, strategy: &dyn FetchStrategy, target: &Target, prefix: &str, ttl: Duration,
) -> FetchOutcome {
    let key = target.fingerprint(prefix);

    match cache.get(&key).await {
        Ok(Some(payload)) => {
            tracing::debug!("cache hit for {}", target.uri);
            return FetchOutcome::Success { payload, content_encoding: None };
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("cache lookup for {} failed, fetching instead: {}", target.uri, e),
    }

    let outcome = strategy.fetch(target).await;

    if let FetchOutcome::Success { payload, .. } = &outcome
        && let Err(e) = cache.set(&key, payload.clone(), ttl).await
    {
        tracing::warn!("cache write for {} failed: {}", target.uri, e);
    }

    outcome
}

/// Builder for [`BatchFetcher`].
#[derive(Default)]
pub struct BatchFetcherBuilder {
    config: Option<FetcherConfig>,
    cache: Option<Arc<dyn CacheGateway>>,
    shared_pool: Option<WorkerPool>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl BatchFetcherBuilder {
    pub fn config(mut self, config: FetcherConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enable cache-aside lookups through `cache`.
    pub fn cache(mut self, cache: Arc<dyn CacheGateway>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run every batch on an externally owned pool instead of a fresh one.
    pub fn shared_pool(mut self, pool: WorkerPool) -> Self {
        self.shared_pool = Some(pool);
        self
    }

    /// Renderer for tier 1 of identity fetches. Defaults to the configured
    /// rendering program, if any.
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Validate configuration and build the fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration (including a zero pool
    /// size or a malformed header) or if the HTTP client cannot be built.
    pub fn build(self) -> Result<BatchFetcher, Error> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let pool_size = NonZeroUsize::new(config.pool_size).ok_or(Error::InvalidPoolSize(config.pool_size))?;
        if self.shared_pool.is_none() {
            WorkerPool::new(pool_size.get())?;
        }

        let direct = Arc::new(DirectFetch::new(&config)?);
        let renderer = self
            .renderer
            .or_else(|| ProcessRenderer::from_config(&config).map(|r| Arc::new(r) as Arc<dyn Renderer>));
        let rendered = Arc::new(RenderedFetch::new(direct.clone(), renderer));

        let cache = self.cache.unwrap_or_else(|| Arc::new(NoCache));

        Ok(BatchFetcher { config, pool_size, shared_pool: self.shared_pool, cache, direct, rendered })
    }
}

/// Concurrent fetcher for batches of targets.
pub struct BatchFetcher {
    config: FetcherConfig,
    pool_size: NonZeroUsize,
    shared_pool: Option<WorkerPool>,
    cache: Arc<dyn CacheGateway>,
    direct: Arc<DirectFetch>,
    rendered: Arc<RenderedFetch>,
}

impl BatchFetcher {
    pub fn builder() -> BatchFetcherBuilder {
        BatchFetcherBuilder::default()
    }

    /// Fetcher with the given configuration, no cache, and per-batch pools.
    pub fn new(config: FetcherConfig) -> Result<Self, Error> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn pool_for_batch(&self) -> WorkerPool {
        self.shared_pool
            .clone()
            .unwrap_or_else(|| WorkerPool::with_size(self.pool_size))
    }

    async fn run(&self, strategy: Arc<dyn FetchStrategy>, targets: Vec<Target>) -> Vec<FetchOutcome> {
        let pool = self.pool_for_batch();
        let prefix: Arc<str> = Arc::from(self.config.cache_key_prefix.as_str());
        let ttl = self.config.cache_ttl();

        let results = pool
            .run_batch(targets, |target| {
                let cache = self.cache.clone();
                let strategy = strategy.clone();
                let prefix = prefix.clone();
                async move {
                    let outcome = fetch_through_cache(cache.as_ref(), strategy.as_ref(), &target, &prefix, ttl).await;
                    tracing::debug!(uri = %target.uri, outcome = outcome.kind(), "fetch finished");
                    outcome
                }
            })
            .await;

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| FetchOutcome::TransportError("fetch task aborted".into())))
            .collect()
    }

    /// Fetch every distinct URI in `targets` with direct GETs.
    ///
    /// Duplicate URIs are fetched once. The result is keyed by URI; see
    /// [`aggregate_targets`] for filtering and JSON handling.
    pub async fn fetch_all<S: AsRef<str>>(&self, targets: &[S]) -> ResultMap {
        let unique: Vec<String> = targets
            .iter()
            .map(|t| t.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if unique.is_empty() {
            return ResultMap::new();
        }

        tracing::debug!("fetching {} distinct targets ({} requested)", unique.len(), targets.len());

        let outcomes = self
            .run(self.direct.clone(), unique.iter().cloned().map(Target::new).collect())
            .await;

        aggregate_targets(unique.into_iter().zip(outcomes), &AggregateOptions::from(&self.config))
    }

    /// Fetch `url` once per identity with rendered fetches.
    ///
    /// Returns one `(identity, payload)` pair per input identity, in input
    /// order, duplicates included; failures yield an empty payload. An empty
    /// `url` does no work and returns nothing. An empty identity list is
    /// treated as a single empty identity.
    pub async fn fetch_identities<S: AsRef<str>>(&self, url: &str, identities: &[S]) -> Vec<(String, String)> {
        if url.trim().is_empty() {
            return Vec::new();
        }

        let identities: Vec<String> = if identities.is_empty() {
            vec![String::new()]
        } else {
            identities.iter().map(|i| i.as_ref().to_string()).collect()
        };

        tracing::debug!(
            "fetching {} under {} identities (renderer: {})",
            url,
            identities.len(),
            self.rendered.has_renderer()
        );

        let targets = identities
            .iter()
            .map(|identity| Target::with_identity(url, identity.clone()))
            .collect();
        let outcomes = self.run(self.rendered.clone(), targets).await;

        aggregate_identities(identities.into_iter().zip(outcomes))
    }
}
