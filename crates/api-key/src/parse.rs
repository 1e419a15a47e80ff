//! Parsing of client-supplied credentials.

use crate::error::{ApiKeyError, Result};
use crate::hash::HASH_SEPARATOR;
use crate::secret::ApiKeySecret;

/// Conventional header carrying `key:secret`.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credentials extracted from a request.
#[derive(Debug)]
pub struct ParsedHeader {
    /// The public key.
    pub key: String,
    secret: ApiKeySecret,
}

impl ParsedHeader {
    /// Get a reference to the secret.
    pub fn secret(&self) -> &ApiKeySecret {
        &self.secret
    }
}

/// Parse an `x-api-key` header value of the form `key:secret`.
///
/// The value is split at the first `:`. Generated keys and secrets never
/// contain one, so anything after it belongs to the secret.
pub fn parse_header(value: &str) -> Result<ParsedHeader> {
    let (key, secret) = value
        .trim()
        .split_once(HASH_SEPARATOR)
        .ok_or(ApiKeyError::InvalidFormat)?;

    if key.is_empty() {
        return Err(ApiKeyError::EmptyKey);
    }
    if secret.is_empty() {
        return Err(ApiKeyError::EmptySecret);
    }

    Ok(ParsedHeader {
        key: key.to_string(),
        secret: ApiKeySecret::new(secret),
    })
}
