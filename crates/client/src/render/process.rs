//! Rendering through an external program.
//!
//! The program is run as `program args... <url> <user_agent>` and must
//! print the rendered document to stdout. The child is killed if the
//! render future is dropped, so an expired deadline never leaves it running.

use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use url::Url;

use fanout_core::FetcherConfig;

use super::{RenderError, RenderOptions, RenderedPage, Renderer};

/// Renderer backed by an external page-rendering program.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    program: String,
    args: Vec<String>,
}

impl ProcessRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Renderer described by `render_program`/`render_args`, if configured.
    pub fn from_config(config: &FetcherConfig) -> Option<Self> {
        config
            .render_program
            .as_ref()
            .map(|program| Self::new(program.clone(), config.render_args.clone()))
    }
}

#[async_trait::async_trait]
impl Renderer for ProcessRenderer {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let start = Instant::now();

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(url.as_str())
            .arg(&opts.user_agent)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RenderError::Spawn(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Process(format!("{} exited with {}: {}", self.program, output.status, stderr.trim())));
        }

        let html = String::from_utf8(output.stdout).map_err(|e| RenderError::Decode(e.to_string()))?;
        let render_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("rendered {} via {} in {}ms", url, self.program, render_time_ms);

        Ok(RenderedPage { html, render_time_ms })
    }
}
