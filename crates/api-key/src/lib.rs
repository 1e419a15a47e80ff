//! Generation and verification of `key:secret` API credentials.
//!
//! This crate provides functionality for:
//! - Generating environment-tagged public keys and one-time secrets from the OS CSPRNG
//! - Hashing key/secret pairs for storage
//! - Comparing hashes in constant time
//! - Parsing `x-api-key` header values
//!
//! # Credential Format
//!
//! Keys follow the format `{environment}_{25 random chars}`, secrets are 35
//! random chars. Clients send both as `key:secret`.
//!
//! Example: `production_K3J~8QZ.MW-0A7DPX1RTC9L4EF:Q8C...`
//!
//! # Security Features
//!
//! - SHA-256 over `key:secret`, so a secret is bound to its key
//! - Constant-time comparison to prevent timing attacks
//! - Memory zeroization of secrets after use
//! - Cryptographically secure random number generation
//!
//! # Example
//!
//! ```rust
//! use api_key::{compute_hash, generate_key, generate_secret, parse_header, verify};
//!
//! let key = generate_key("production");
//! let secret = generate_secret();
//!
//! // Give key and secret to the user (the secret is only shown once!)
//! let stored_hash = compute_hash(&key, secret.expose());
//!
//! // Later, verify a request header
//! let header = format!("{}:{}", key, secret.expose());
//! let parsed = parse_header(&header).unwrap();
//! assert!(verify(&parsed.key, parsed.secret().expose(), &stored_hash));
//! ```

mod config;
mod error;
mod hash;
mod parse;
mod secret;
mod token;
mod verify;

// Public re-exports
pub use config::RandomOptions;
pub use error::{ApiKeyError, Result};
pub use hash::{compute_hash, HASH_SEPARATOR};
pub use parse::{parse_header, ParsedHeader, API_KEY_HEADER};
pub use secret::ApiKeySecret;
pub use token::{generate_key, generate_secret, random_string, KEY_LENGTH, SECRET_LENGTH};
pub use verify::{hashes_equal, verify};
