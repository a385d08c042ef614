//! # Cryptography Module
//!
//! All cryptographic primitives used by NoContact Core.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEYS (OpenPGP, RSA ≥ 4096)                   │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  name + email + passphrase                                     │   │
//! │  │            │                                                    │   │
//! │  │            ▼                                                    │   │
//! │  │  ┌─────────────────┐         ┌─────────────────┐              │   │
//! │  │  │  public.pgp     │         │  private.pgp    │              │   │
//! │  │  │                 │         │                 │              │   │
//! │  │  │ • "Name <email>"│         │ • passphrase-   │              │   │
//! │  │  │ • encrypt to    │         │   protected     │              │   │
//! │  │  │ • shared freely │         │ • never leaves  │              │   │
//! │  │  │                 │         │   the client    │              │   │
//! │  │  └─────────────────┘         └─────────────────┘              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 MESSAGES                                        │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  plaintext ──► PKESK(RSA subkey) + SEIPD(AES-256) ──► armor    │   │
//! │  │  plaintext ──► scramble() ──► display stand-in                 │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 IDENTITY HASHES                                 │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  name, email ──► Argon2id(random salt) ──► (hash, salt)        │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Why Chosen |
//! |-----------|---------|------------|
//! | OpenPGP RSA-4096 | Keys, encryption | Interoperable armored key files |
//! | AES-256 (SEIPDv1) | Message body | Supported by every OpenPGP client |
//! | Argon2id | Identity hashes | Memory-hard, slows offline guessing |
//! | SHA-256 | Scrambler seed | Stable, cheap |
//!
//! ## Threading
//!
//! RSA and Argon2 are CPU bound. Every async entry point in this module runs
//! the work on tokio's blocking pool through [`offload`], so callers on the
//! async executor never stall.

mod cipher;
mod hashing;
mod keys;
mod scramble;

pub use cipher::{
    decrypt, decrypt_message, encrypt, encrypt_message, encrypt_message_to_many,
    encrypt_to_many, is_armored, ARMOR_MARKER,
};
pub use hashing::{hash_string, verify_hashed_string, HashedString, HashingConfig, HASH_LEN};
pub use keys::{
    format_user_id, generate_key_pair, is_matching_pair, parse_private_key, parse_public_key,
    unlock_private_key, KeyGenConfig, KeyPair, MIN_RSA_BITS,
};
pub use scramble::scramble;

use crate::error::Result;

/// Run CPU-heavy work on the blocking pool
pub(crate) async fn offload<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Hash on the blocking pool
pub async fn hash_string_async(input: &str, config: &HashingConfig) -> Result<HashedString> {
    let input = zeroize::Zeroizing::new(input.to_string());
    let config = config.clone();

    offload(move || hash_string(input.as_str(), &config)).await
}

/// Verify on the blocking pool
///
/// A failed task counts as a failed verification.
pub async fn verify_hashed_string_async(
    candidate: &str,
    stored: &HashedString,
    config: &HashingConfig,
) -> bool {
    let candidate = zeroize::Zeroizing::new(candidate.to_string());
    let stored = stored.clone();
    let config = config.clone();

    offload(move || {
        Ok(verify_hashed_string(
            candidate.as_str(),
            &stored.hash,
            &stored.salt,
            &config,
        ))
    })
    .await
    .unwrap_or(false)
}
