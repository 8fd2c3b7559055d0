//! Direct HTTP fetch.
//!
//! ### Request
//! - One GET per target, no retries
//! - Configured headers merged in, then `Accept-Encoding: gzip`
//! - A target identity, when present, replaces the User-Agent
//!
//! ### Classification
//! - 2xx: `Success`, gzip bodies decoded here (reqwest is built without
//!   its decompression features, so bodies arrive as sent)
//! - Non-2xx status, bad URL, connection or read failure: `TransportError`
//! - Undecodable gzip body: `MalformedResponse`

pub mod decode;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;

use fanout_core::{Error, FetcherConfig};

use crate::guard::{Guarded, TimeoutGuard};
use crate::outcome::{FetchOutcome, Target};
use crate::strategy::FetchStrategy;

pub use decode::{DecodeError, decode_body};

/// Convert configured header pairs into a validated header map.
///
/// # Errors
///
/// Returns `Error::InvalidHeader` for a name or value HTTP cannot carry.
pub fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Single-request fetch strategy.
#[derive(Debug, Clone)]
pub struct DirectFetch {
    http: Client,
    headers: HeaderMap,
    timeout: Duration,
}

impl DirectFetch {
    /// Build a direct fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configured headers or if the HTTP
    /// client cannot be built.
    pub fn new(config: &FetcherConfig) -> Result<Self, Error> {
        let mut headers = header_map(&config.headers)?;
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, headers, timeout: config.timeout() })
    }

    /// Per-request deadline applied by [`FetchStrategy::fetch`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue the request with no deadline of its own, stopping early if
    /// `cancel` fires.
    pub async fn request(&self, target: &Target, cancel: CancellationToken) -> FetchOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => FetchOutcome::TimedOut,
            outcome = self.send(target) => outcome,
        }
    }

    async fn send(&self, target: &Target) -> FetchOutcome {
        let start = Instant::now();

        let url = match Url::parse(&target.uri) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::TransportError(format!("invalid url {:?}: {}", target.uri, e)),
        };

        let mut headers = self.headers.clone();
        if let Some(identity) = &target.identity {
            match HeaderValue::from_str(identity) {
                Ok(value) => {
                    headers.insert(header::USER_AGENT, value);
                }
                Err(e) => return FetchOutcome::TransportError(format!("invalid identity header: {}", e)),
            }
        }

        let response = match self.http.get(url).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransportError(format!("network error: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::TransportError(format!("status {}", status.as_u16()));
        }

        let content_encoding = response
            .headers()
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_ascii_lowercase());

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::TransportError(format!("failed to read response: {}", e)),
        };
        let wire_len = body.len();

        match decode_body(body, content_encoding.as_deref()) {
            Ok(payload) => {
                tracing::debug!(
                    "fetched {} in {}ms ({} bytes on the wire, {} decoded)",
                    target.uri,
                    start.elapsed().as_millis(),
                    wire_len,
                    payload.len()
                );
                FetchOutcome::Success { payload, content_encoding }
            }
            Err(e) => FetchOutcome::MalformedResponse(e.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl FetchStrategy for DirectFetch {
    async fn fetch(&self, target: &Target) -> FetchOutcome {
        let guard = TimeoutGuard::new(self.timeout);
        match guard.run(|cancel| self.request(target, cancel)).await {
            Guarded::Completed(outcome) => outcome,
            Guarded::TimedOut => FetchOutcome::TimedOut,
        }
    }
}
