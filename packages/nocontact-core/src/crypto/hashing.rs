//! # Salted Hashing
//!
//! One-way hashing of identity fields (name, email) so the server side never
//! stores them in plaintext.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SALTED IDENTITY HASH                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  input ("alice@example.com")        salt (16 random bytes, OsRng)      │
//! │        │                                  │                             │
//! │        └──────────────┬───────────────────┘                             │
//! │                       ▼                                                 │
//! │          Argon2id(m = 19 MiB, t = 2, p = 1)                             │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │             32-byte digest ──► hex ──► stored with hex(salt)           │
//! │                                                                         │
//! │  Verification recomputes the digest with the stored salt and compares  │
//! │  every byte, whatever the content.                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Digest length in bytes
pub const HASH_LEN: usize = 32;

/// Smallest salt Argon2 accepts
pub const MIN_SALT_LEN: usize = 8;

/// Cost parameters for identity hashing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
    /// Salt length in bytes
    pub salt_len: usize,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
            salt_len: 16,
        }
    }
}

impl HashingConfig {
    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(HASH_LEN),
        )
        .map_err(|e| Error::HashingFailed(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A hex-encoded digest together with the hex-encoded salt that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedString {
    /// Hex digest
    pub hash: String,
    /// Hex salt
    pub salt: String,
}

/// Hash `input` under a fresh random salt
pub fn hash_string(input: &str, config: &HashingConfig) -> Result<HashedString> {
    if config.salt_len < MIN_SALT_LEN {
        return Err(Error::HashingFailed(format!(
            "salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }

    let mut salt = vec![0u8; config.salt_len];
    OsRng.fill_bytes(&mut salt);

    let digest = digest(input.as_bytes(), &salt, config)?;

    Ok(HashedString {
        hash: hex::encode(digest),
        salt: hex::encode(salt),
    })
}

/// Check `candidate` against a stored hash and salt
///
/// Fails closed: an empty candidate, undecodable hex or a hashing error all
/// yield `false`.
pub fn verify_hashed_string(
    candidate: &str,
    hash: &str,
    salt: &str,
    config: &HashingConfig,
) -> bool {
    if candidate.is_empty() {
        return false;
    }

    let (Ok(expected), Ok(salt)) = (hex::decode(hash), hex::decode(salt)) else {
        tracing::debug!("Stored hash or salt is not valid hex");
        return false;
    };

    match digest(candidate.as_bytes(), &salt, config) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(e) => {
            tracing::warn!("Hash verification failed to compute digest: {}", e);
            false
        }
    }
}

fn digest(input: &[u8], salt: &[u8], config: &HashingConfig) -> Result<[u8; HASH_LEN]> {
    let mut out = [0u8; HASH_LEN];
    config
        .argon2()?
        .hash_password_into(input, salt, &mut out)
        .map_err(|e| Error::HashingFailed(e.to_string()))?;
    Ok(out)
}

/// Compare two digests without exiting early on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // Stored digests have a fixed length, so the length check reveals nothing
    // about the candidate.
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============================================================================
// TESTS
// ============================================================================
