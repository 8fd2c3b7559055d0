//! Fetch strategies.
//!
//! [`FetchStrategy`] is the single capability the batch runner needs:
//! turn a [`Target`] into a [`FetchOutcome`], never failing outright.
//! [`DirectFetch`](crate::fetch::DirectFetch) issues one GET; [`RenderedFetch`]
//! tries a full page render first and falls back to a direct GET carrying
//! the same identity.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::fetch::DirectFetch;
use crate::guard::{Guarded, TimeoutGuard};
use crate::outcome::{FetchOutcome, Target};
use crate::render::{RenderError, RenderOptions, Renderer, validate_markup};

/// Polymorphic fetch behaviour.
#[async_trait::async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Fetch one target. Every failure is reported as an outcome variant.
    async fn fetch(&self, target: &Target) -> FetchOutcome;
}

/// Two-tier fetch: render, then fall back to a direct request.
///
/// Each tier runs under its own deadline, one after the other. Without a
/// renderer only tier 2 runs.
pub struct RenderedFetch {
    renderer: Option<Arc<dyn Renderer>>,
    direct: Arc<DirectFetch>,
    timeout: Duration,
}

impl RenderedFetch {
    pub fn new(direct: Arc<DirectFetch>, renderer: Option<Arc<dyn Renderer>>) -> Self {
        let timeout = direct.timeout();
        Self { renderer, direct, timeout }
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    async fn render_tier(&self, renderer: &dyn Renderer, target: &Target) -> FetchOutcome {
        let url = match Url::parse(&target.uri) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::RenderError(RenderError::InvalidUrl(e.to_string()).to_string()),
        };
        let opts = RenderOptions { user_agent: target.identity.clone().unwrap_or_default(), ..Default::default() };

        let guard = TimeoutGuard::new(self.timeout);
        let rendered = guard
            .run(|cancel| async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RenderError::Cancelled),
                    page = renderer.render(&url, &opts) => page,
                }
            })
            .await;

        match rendered {
            Guarded::TimedOut => FetchOutcome::TimedOut,
            Guarded::Completed(Err(e)) => FetchOutcome::RenderError(e.to_string()),
            Guarded::Completed(Ok(page)) => match validate_markup(&page.html) {
                Ok(()) => {
                    tracing::debug!("rendered {} in {}ms", target.uri, page.render_time_ms);
                    FetchOutcome::Success { payload: Bytes::from(page.html), content_encoding: None }
                }
                Err(e) => FetchOutcome::RenderError(e.to_string()),
            },
        }
    }
}

#[async_trait::async_trait]
impl FetchStrategy for RenderedFetch {
    async fn fetch(&self, target: &Target) -> FetchOutcome {
        if let Some(renderer) = &self.renderer {
            let rendered = self.render_tier(renderer.as_ref(), target).await;
            if rendered.is_success() {
                return rendered;
            }
            tracing::debug!(
                uri = %target.uri,
                identity = target.identity.as_deref().unwrap_or_default(),
                reason = %rendered,
                "render tier failed, falling back to direct fetch"
            );
        }

        match self.direct.fetch(target).await {
            success @ FetchOutcome::Success { .. } => success,
            failed => FetchOutcome::TransportError(format!("direct fallback failed: {failed}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedPage;
    use crate::test_support::TestServer;
    use fanout_core::FetcherConfig;
    use std::sync::Mutex;

    /// Renderer returning a canned result and recording identities.
    struct StubRenderer {
        result: Result<String, String>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl StubRenderer {
        fn ok(html: &str) -> Self {
            Self { result: Ok(html.to_string()), delay: Duration::ZERO, seen: Mutex::default() }
        }

        fn failing(msg: &str) -> Self {
            Self { result: Err(msg.to_string()), delay: Duration::ZERO, seen: Mutex::default() }
        }
    }

    #[async_trait::async_trait]
    impl Renderer for StubRenderer {
        async fn render(&self, _url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
            self.seen.lock().unwrap().push(opts.user_agent.clone());
            tokio::time::sleep(self.delay).await;
            match &self.result {
                Ok(html) => Ok(RenderedPage { html: html.clone(), render_time_ms: 1 }),
                Err(msg) => Err(RenderError::Process(msg.clone())),
            }
        }
    }

    fn direct(config: &FetcherConfig) -> Arc<DirectFetch> {
        Arc::new(DirectFetch::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_rendered_output_wins() {
        let server = TestServer::spawn().await;
        let stub = Arc::new(StubRenderer::ok("<html><body>rendered</body></html>"));
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), Some(stub.clone()));

        let outcome = strategy.fetch(&Target::with_identity(server.url("/page"), "UA1")).await;

        assert_eq!(outcome, FetchOutcome::success("<html><body>rendered</body></html>"));
        assert_eq!(server.total_hits(), 0, "no fallback request when render succeeds");
        assert_eq!(*stub.seen.lock().unwrap(), vec!["UA1".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_markup_falls_back_with_identity() {
        let server = TestServer::spawn().await;
        let stub = Arc::new(StubRenderer::ok("EPIC FAIL"));
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), Some(stub));

        let outcome = strategy
            .fetch(&Target::with_identity(server.url("/echo/user-agent"), "UA1"))
            .await;

        assert_eq!(outcome, FetchOutcome::success("UA1"));
    }

    #[tokio::test]
    async fn test_renderer_error_falls_back() {
        let server = TestServer::spawn().await;
        let stub = Arc::new(StubRenderer::failing("phantom crashed"));
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), Some(stub));

        let outcome = strategy.fetch(&Target::with_identity(server.url("/page"), "UA1")).await;

        assert_eq!(outcome, FetchOutcome::success("payload for /page"));
        assert_eq!(server.hits("/page"), 1);
    }

    #[tokio::test]
    async fn test_render_timeout_falls_back() {
        let server = TestServer::spawn().await;
        let config = FetcherConfig { timeout_secs: 1, ..Default::default() };
        let stub = Arc::new(StubRenderer {
            result: Ok("<html></html>".into()),
            delay: Duration::from_secs(3),
            seen: Mutex::default(),
        });
        let strategy = RenderedFetch::new(direct(&config), Some(stub));

        let outcome = strategy.fetch(&Target::with_identity(server.url("/page"), "UA1")).await;

        assert_eq!(outcome, FetchOutcome::success("payload for /page"));
    }

    #[tokio::test]
    async fn test_both_tiers_failing_is_transport_error() {
        let server = TestServer::spawn().await;
        let stub = Arc::new(StubRenderer::failing("no display"));
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), Some(stub));

        let outcome = strategy.fetch(&Target::with_identity(server.url("/status/500"), "UA1")).await;

        assert!(matches!(outcome, FetchOutcome::TransportError(_)), "got {outcome}");
    }

    #[tokio::test]
    async fn test_unparseable_url_skips_renderer() {
        let stub = Arc::new(StubRenderer::ok("<html></html>"));
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), Some(stub.clone()));

        let outcome = strategy.fetch(&Target::with_identity("frob.noz", "UA1")).await;

        assert!(matches!(outcome, FetchOutcome::TransportError(_)), "got {outcome}");
        assert!(stub.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_renderer_goes_direct() {
        let server = TestServer::spawn().await;
        let strategy = RenderedFetch::new(direct(&FetcherConfig::default()), None);
        assert!(!strategy.has_renderer());

        let outcome = strategy.fetch(&Target::with_identity(server.url("/page"), "")).await;

        assert_eq!(outcome, FetchOutcome::success("payload for /page"));
    }
}
