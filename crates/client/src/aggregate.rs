//! Result assembly for both batch flows.
//!
//! This is the boundary where [`FetchOutcome`]s stop existing: every
//! non-success becomes the sentinel payload, so callers get a structurally
//! complete result no matter how many fetches failed.

use std::collections::HashMap;

use fanout_core::FetcherConfig;
use serde::Serialize;

use crate::outcome::FetchOutcome;

/// Final payload for one target of the target-keyed flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Raw body (or the default value for a failed fetch).
    Text(String),
    /// Body re-interpreted as JSON.
    Json(serde_json::Value),
    /// JSON coercion was requested and the body was not JSON.
    Absent,
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Target-keyed result: one entry per distinct target that survived filtering.
pub type ResultMap = HashMap<String, Payload>;

/// Post-processing switches for the target-keyed flow.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub default_value: String,
    pub filter_out_empty_responses: bool,
    pub treat_results_as_json: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { default_value: String::new(), filter_out_empty_responses: true, treat_results_as_json: false }
    }
}

impl From<&FetcherConfig> for AggregateOptions {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            default_value: config.default_value.clone(),
            filter_out_empty_responses: config.filter_out_empty_responses,
            treat_results_as_json: config.treat_results_as_json,
        }
    }
}

/// Collapse an outcome to its payload text, substituting `default_value`
/// for anything but a success.
///
/// Results are always text. Bytes that are not valid UTF-8 are replaced
/// with U+FFFD, so binary bodies do not survive aggregation intact; read
/// [`FetchOutcome::into_payload`] directly when the raw bytes matter.
pub fn collapse(outcome: FetchOutcome, default_value: &str) -> String {
    match outcome {
        FetchOutcome::Success { payload, .. } => String::from_utf8_lossy(&payload).into_owned(),
        _ => default_value.to_string(),
    }
}

/// Assemble the target-keyed result.
///
/// Empty payloads are dropped when filtering is on. With JSON coercion, an
/// entry that fails to decode becomes [`Payload::Absent`] without touching
/// its siblings.
pub fn aggregate_targets<I>(outcomes: I, opts: &AggregateOptions) -> ResultMap
where
    I: IntoIterator<Item = (String, FetchOutcome)>,
{
    outcomes
        .into_iter()
        .map(|(target, outcome)| (target, collapse(outcome, &opts.default_value)))
        .filter(|(_, text)| !(opts.filter_out_empty_responses && text.is_empty()))
        .map(|(target, text)| {
            let payload = if opts.treat_results_as_json {
                match serde_json::from_str(&text) {
                    Ok(value) => Payload::Json(value),
                    Err(e) => {
                        tracing::debug!("payload for {} is not JSON: {}", target, e);
                        Payload::Absent
                    }
                }
            } else {
                Payload::Text(text)
            };
            (target, payload)
        })
        .collect()
}

/// Assemble the identity-ordered result: same order and length as the
/// input, failures as empty strings.
pub fn aggregate_identities<I>(outcomes: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, FetchOutcome)>,
{
    outcomes
        .into_iter()
        .map(|(identity, outcome)| (identity, collapse(outcome, "")))
        .collect()
}
