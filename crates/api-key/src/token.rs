//! Key and secret generation.

use rand::Rng;
use rand::rngs::OsRng;

use crate::config::RandomOptions;
use crate::secret::ApiKeySecret;

/// Number of random characters in a public key (prefix excluded).
pub const KEY_LENGTH: usize = 25;

/// Number of random characters in a secret.
pub const SECRET_LENGTH: usize = 35;

const DIGITS: &str = "0123456789";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
// Unreserved in RFC 3986, and never ':' which separates key and secret on the wire.
const SYMBOLS: &str = "-.~";

fn charset(options: &RandomOptions) -> Vec<u8> {
    let mut chars = String::with_capacity(DIGITS.len() + UPPER.len() + LOWER.len() + SYMBOLS.len());
    chars.push_str(UPPER);
    if !options.upper_case {
        chars.push_str(LOWER);
    }
    chars.push_str(DIGITS);
    if !options.safe {
        chars.push_str(SYMBOLS);
    }
    chars.into_bytes()
}

/// Generate a random string of `length` characters using the OS CSPRNG.
///
/// The prefix from `options`, if any, is prepended and does not count
/// towards `length`.
pub fn random_string(length: usize, options: &RandomOptions) -> String {
    let chars = charset(options);
    let prefix = options.prefix.as_deref().unwrap_or_default();

    let mut out = String::with_capacity(prefix.len() + length);
    out.push_str(prefix);
    for _ in 0..length {
        let idx = OsRng.gen_range(0..chars.len());
        out.push(chars[idx] as char);
    }
    out
}

/// Generate a public key tagged with the deployment environment:
/// `{environment}_{25 random chars}`.
pub fn generate_key(environment: &str) -> String {
    random_string(
        KEY_LENGTH,
        &RandomOptions::new()
            .safe(false)
            .upper_case(true)
            .with_prefix(format!("{}_", environment)),
    )
}

/// Generate a fresh secret (35 random chars, no prefix).
pub fn generate_secret() -> ApiKeySecret {
    ApiKeySecret::new(random_string(
        SECRET_LENGTH,
        &RandomOptions::new().safe(false).upper_case(true),
    ))
}
