//! Headless Chrome/Chromium renderer using chromiumoxide.

use std::future::Future;
use std::time::Instant;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use futures_util::StreamExt;
use url::Url;

use super::{RenderError, RenderOptions, RenderedPage, Renderer};

/// Runs a cleanup future exactly once: awaited by [`CloseOnDrop::close`],
/// or spawned onto the runtime if the guard is dropped first (for example
/// when a deadline abandons the render).
struct CloseOnDrop<F, Fut>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    close: Option<F>,
}

impl<F, Fut> CloseOnDrop<F, Fut>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn new(close: F) -> Self {
        Self { close: Some(close) }
    }

    async fn close(mut self) {
        if let Some(close) = self.close.take() {
            close().await;
        }
    }
}

impl<F, Fut> Drop for CloseOnDrop<F, Fut>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(close) = self.close.take()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            runtime.spawn(close());
        }
    }
}

/// Headless Chrome/Chromium renderer.
///
/// One browser is shared by every render; each render gets its own tab,
/// closed on every exit path.
pub struct HeadlessRenderer {
    browser: Browser,
}

impl HeadlessRenderer {
    /// Create a new headless renderer by launching a browser instance.
    ///
    /// `window` is the browser window size; each page is additionally sized
    /// to [`RenderOptions::viewport`]. The browser uses a background task to
    /// handle Chrome DevTools Protocol events.
    pub async fn new(window: (u32, u32)) -> Result<Self, RenderError> {
        let (browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .window_size(window.0, window.1)
                .build()
                .map_err(RenderError::BrowserLaunch)?,
        )
        .await
        .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let start = Instant::now();

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let tab = CloseOnDrop::new({
            let page = page.clone();
            move || async move {
                if let Err(e) = page.close().await {
                    tracing::debug!("failed to close render tab: {e}");
                }
            }
        });

        let rendered = async {
            let (width, height) = opts.viewport;
            page.execute(SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            if !opts.user_agent.is_empty() {
                page.set_user_agent(SetUserAgentOverrideParams::new(opts.user_agent.clone()))
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?;
            }

            page.goto(url.as_str())
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            page.content()
                .await
                .map_err(|e| RenderError::ContentRetrieval(e.to_string()))
        }
        .await;

        tab.close().await;

        let html = rendered?;
        Ok(RenderedPage { html, render_time_ms: start.elapsed().as_millis() as u64 })
    }
}
