//! Secret half of an API key.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A plaintext secret handed to the caller once, at creation or reset.
///
/// Only its hash is ever stored. The buffer is wiped when dropped and the
/// value is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKeySecret(String);

impl ApiKeySecret {
    /// Wrap a plaintext secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the plaintext.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKeySecret(***)")
    }
}

impl From<String> for ApiKeySecret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for ApiKeySecret {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = ApiKeySecret::new("TOPSECRET");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("TOPSECRET"));
    }

    #[test]
    fn test_zeroize_clears_buffer() {
        let mut secret = ApiKeySecret::new("TOPSECRET");
        secret.zeroize();
        assert!(secret.expose().is_empty());
    }
}
