//! Hash verification with constant-time comparison.

use subtle::ConstantTimeEq;

use crate::hash::compute_hash;

/// Constant-time comparison of two hash strings.
///
/// Runs in time independent of where the inputs differ. Inputs of different
/// length compare unequal.
pub fn hashes_equal(candidate: &str, stored: &str) -> bool {
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}

/// Verify a raw key and secret against a stored hash.
pub fn verify(key: &str, secret: &str, stored_hash: &str) -> bool {
    hashes_equal(&compute_hash(key, secret), stored_hash)
}
