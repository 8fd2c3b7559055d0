//! Full-page rendering for tier 1 of rendered fetches.
//!
//! This module provides the renderer trait, output validation, and two
//! implementations: an external rendering program driven over stdout, and
//! a feature-gated headless Chrome/Chromium renderer using chromiumoxide.

#[cfg(feature = "render")]
pub mod headless;
pub mod process;

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;
pub use process::ProcessRenderer;

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The target is not a URL a renderer can open.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// The rendering program could not be started.
    #[error("failed to start renderer: {0}")]
    Spawn(String),

    /// The rendering program exited unsuccessfully.
    #[error("renderer process failed: {0}")]
    Process(String),

    /// The rendering program wrote output that is not UTF-8.
    #[error("renderer output is not valid UTF-8: {0}")]
    Decode(String),

    /// The renderer produced something that does not parse as markup.
    #[error("renderer output is not markup: {0}")]
    InvalidMarkup(String),

    /// The guarding deadline cancelled the render.
    #[error("render cancelled")]
    Cancelled,
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Client identity presented by the renderer. Empty means the
    /// renderer's own default.
    pub user_agent: String,

    /// Viewport dimensions (default: 1280x720).
    pub viewport: (u32, u32),
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { user_agent: String::new(), viewport: (1280, 720) }
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Rendered HTML content.
    pub html: String,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,
}

/// Renderer trait for full-page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL to HTML under the given client identity.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;
}

/// Check that renderer output is an HTML document.
///
/// The output must be non-blank, start with a tag, and parse to a document
/// that either declares its own `<html>` root or contains at least one
/// element besides the `html`/`head`/`body` skeleton the parser supplies.
/// Failure banners and empty output are rejected.
pub fn validate_markup(raw: &str) -> Result<(), RenderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RenderError::InvalidMarkup("empty output".into()));
    }

    if !trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(40).collect();
        return Err(RenderError::InvalidMarkup(format!("unexpected leading text {preview:?}")));
    }

    let declares_root = trimmed
        .get(..trimmed.len().min(1024))
        .map(|head| head.to_ascii_lowercase().contains("<html"))
        .unwrap_or(false);
    if declares_root {
        return Ok(());
    }

    let document = Html::parse_document(trimmed);
    let any = Selector::parse("*").map_err(|e| RenderError::InvalidMarkup(e.to_string()))?;
    let has_content_element = document
        .select(&any)
        .any(|element| !matches!(element.value().name(), "html" | "head" | "body"));

    if has_content_element {
        Ok(())
    } else {
        Err(RenderError::InvalidMarkup("no elements found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_default() {
        let opts = RenderOptions::default();
        assert!(opts.user_agent.is_empty());
        assert_eq!(opts.viewport, (1280, 720));
    }

    #[test]
    fn test_full_document_is_valid() {
        assert!(validate_markup("<html><head><title>t</title></head><body><p>hi</p></body></html>").is_ok());
        assert!(validate_markup("<!DOCTYPE html>\n<HTML><body></body></HTML>").is_ok());
    }

    #[test]
    fn test_fragment_with_elements_is_valid() {
        assert!(validate_markup("<div><p>story</p></div>").is_ok());
    }

    #[test]
    fn test_failure_banner_is_invalid() {
        assert!(matches!(validate_markup("EPIC FAIL"), Err(RenderError::InvalidMarkup(_))));
    }

    #[test]
    fn test_empty_output_is_invalid() {
        assert!(matches!(validate_markup("   \n"), Err(RenderError::InvalidMarkup(_))));
    }

    #[test]
    fn test_stray_angle_bracket_is_invalid() {
        assert!(matches!(validate_markup("<> nothing here"), Err(RenderError::InvalidMarkup(_))));
    }
}
