//! Fetch targets and the tagged result of a single fetch attempt.

use bytes::Bytes;

use fanout_core::fingerprint;

/// One fetch request: a URI, optionally paired with a client identity
/// (sent as the User-Agent / handed to the renderer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub uri: String,
    pub identity: Option<String>,
}

impl Target {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), identity: None }
    }

    pub fn with_identity(uri: impl Into<String>, identity: impl Into<String>) -> Self {
        Self { uri: uri.into(), identity: Some(identity.into()) }
    }

    /// Cache key for this target under the given namespace.
    pub fn fingerprint(&self, prefix: &str) -> String {
        fingerprint(prefix, &self.uri, self.identity.as_deref())
    }
}

/// Result of one fetch attempt.
///
/// Produced by strategies and the timeout guard, and collapsed to a
/// sentinel payload by the aggregator. Callers of the batch API never see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Payload after transfer decoding, plus the encoding it arrived with.
    Success { payload: Bytes, content_encoding: Option<String> },
    /// The deadline elapsed before the fetch completed.
    TimedOut,
    /// Connection failure, bad URL, or a non-success HTTP status.
    TransportError(String),
    /// The response arrived but its body could not be decoded.
    MalformedResponse(String),
    /// The renderer failed or produced output that is not markup.
    RenderError(String),
}

impl FetchOutcome {
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self::Success { payload: payload.into(), content_encoding: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::TimedOut => "timed_out",
            Self::TransportError(_) => "transport_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RenderError(_) => "render_error",
        }
    }

    /// The payload, if this is a success.
    pub fn into_payload(self) -> Option<Bytes> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { payload, .. } => write!(f, "success ({} bytes)", payload.len()),
            Self::TimedOut => write!(f, "timed out"),
            Self::TransportError(msg) => write!(f, "transport error: {msg}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Self::RenderError(msg) => write!(f, "render error: {msg}"),
        }
    }
}
