//! Unified error types for fanout.
//!
//! Only configuration and cache-backend failures are represented here.
//! Per-target fetch failures never surface as errors; they are carried as
//! outcome variants and collapsed to the configured sentinel.

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Unified error type for fanout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    #[error("INVALID_CONFIG: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool size must be at least one.
    #[error("INVALID_POOL_SIZE: {0}")]
    InvalidPoolSize(usize),

    /// A configured request header has an invalid name or value.
    #[error("INVALID_HEADER: {0}")]
    InvalidHeader(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),

    /// Cache database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
