//! Client construction and storage error types.
//!
//! Request failures are reduced to a [`ClassifiedError`] first; [`Error`]
//! wraps one only so callers can mix both with `?`.

use thiserror::Error;

use crate::classify::ClassifiedError;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid invalidation pattern.
    #[error("Invalid cache pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Session persistence failed.
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// A request failed.
    #[error(transparent)]
    Request(#[from] ClassifiedError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for client construction and storage.
pub type Result<T> = std::result::Result<T, Error>;
