//! Client code for fanout.
//!
//! This crate provides the concurrent fetch pipeline: bounded worker pools,
//! per-fetch deadlines, direct and rendered fetch strategies, and result
//! aggregation for the target-keyed and identity-ordered batch flows.

pub mod aggregate;
pub mod batch;
pub mod fetch;
pub mod guard;
pub mod outcome;
pub mod pool;
pub mod render;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use aggregate::{AggregateOptions, Payload, ResultMap, aggregate_identities, aggregate_targets};
pub use batch::{BatchFetcher, BatchFetcherBuilder, fetch_through_cache};
pub use fetch::{DirectFetch, header_map};
pub use guard::{Guarded, TimeoutGuard};
pub use outcome::{FetchOutcome, Target};
pub use pool::WorkerPool;
#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
pub use render::{ProcessRenderer, RenderError, RenderOptions, RenderedPage, Renderer, validate_markup};
pub use strategy::{FetchStrategy, RenderedFetch};
