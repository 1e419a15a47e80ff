//! Error types for API key operations.

use thiserror::Error;

/// Errors that can occur while reading credentials supplied by a client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiKeyError {
    /// Header value has no `key:secret` separator.
    #[error("Invalid credential format, expected 'key:secret'")]
    InvalidFormat,

    /// The key part before the separator is empty.
    #[error("Missing API key")]
    EmptyKey,

    /// The secret part after the separator is empty.
    #[error("Missing API key secret")]
    EmptySecret,
}

/// Result type alias for API key operations.
pub type Result<T> = std::result::Result<T, ApiKeyError>;
