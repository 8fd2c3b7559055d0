//! Core types and shared functionality for fanout.
//!
//! This crate provides:
//! - The look-aside cache capability and its memory and SQLite backends
//! - Unified error types
//! - Layered fetcher configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheGateway, MemoryCache, NoCache, SqliteCache, fingerprint};
pub use config::{CacheBackend, ConfigError, FetcherConfig};
pub use error::Error;
