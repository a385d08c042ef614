//! # Message Cipher
//!
//! OpenPGP public-key encryption of chat messages.
//!
//! ## Decryption Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DECRYPT(input)                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  contains "BEGIN"? ──no──► return input unchanged (legacy plaintext)   │
//! │        │                                                                │
//! │       yes                                                               │
//! │        ▼                                                                │
//! │  parse armored message ──fail──► MalformedMessage                      │
//! │        ▼                                                                │
//! │  parse private key     ──fail──► InvalidKey                            │
//! │        ▼                                                                │
//! │  unlock with passphrase ─fail──► WrongPassphrase                       │
//! │        ▼                                                                │
//! │  decrypt session key + data ─fail──► DecryptionFailed                  │
//! │        ▼                                                                │
//! │  UTF-8 plaintext                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pgp::composed::{Message, SignedPublicKey, SignedPublicSubKey};
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::public_key::PublicKeyAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::types::{
    EskType, Fingerprint, KeyId, KeyVersion, PkeskBytes, PublicKeyTrait, PublicParams,
    SignatureBytes,
};
use pgp::{ArmorOptions, Deserializable};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

use super::keys::{parse_private_key, parse_public_key, unlock_private_key};
use crate::error::{Error, Result};

/// Marker every armored OpenPGP block contains
pub const ARMOR_MARKER: &str = "BEGIN";

/// Whether `text` looks like armored OpenPGP data
pub fn is_armored(text: &str) -> bool {
    text.contains(ARMOR_MARKER)
}

/// Encrypt `plaintext` to a single recipient
pub fn encrypt_message(public_key_armored: &str, plaintext: &str) -> Result<String> {
    encrypt_message_to_many(&[public_key_armored], plaintext)
}

/// Encrypt `plaintext` so that any of the given public keys can read it
pub fn encrypt_message_to_many(public_keys_armored: &[&str], plaintext: &str) -> Result<String> {
    if public_keys_armored.is_empty() {
        return Err(Error::EncryptionFailed("no recipients".into()));
    }

    let keys = public_keys_armored
        .iter()
        .map(|armored| parse_public_key(armored))
        .collect::<Result<Vec<_>>>()?;
    let targets = keys
        .iter()
        .map(EncryptionTarget::select)
        .collect::<Result<Vec<_>>>()?;
    let targets: Vec<&EncryptionTarget<'_>> = targets.iter().collect();

    let mut rng = OsRng;
    let encrypted = Message::new_literal("", plaintext)
        .encrypt_to_keys_seipdv1(&mut rng, SymmetricKeyAlgorithm::AES256, &targets[..])
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

    encrypted
        .to_armored_string(ArmorOptions::default())
        .map_err(|e| Error::EncryptionFailed(e.to_string()))
}

/// Decrypt an armored message with a passphrase-protected private key
///
/// Input without the armor marker is returned as-is.
pub fn decrypt_message(
    private_key_armored: &str,
    passphrase: &str,
    armored_input: &str,
) -> Result<String> {
    if !is_armored(armored_input) {
        return Ok(armored_input.to_string());
    }

    let (message, _headers) = Message::from_string(armored_input)
        .map_err(|e| Error::MalformedMessage(e.to_string()))?;

    let key = parse_private_key(private_key_armored)?;
    unlock_private_key(&key, passphrase)?;

    let (decrypted, _key_ids) = message
        .decrypt(|| passphrase.to_string(), &[&key])
        .map_err(|e| Error::DecryptionFailed(e.to_string()))?;

    let decrypted = match decrypted {
        Message::Compressed(_) => decrypted
            .decompress()
            .map_err(|e| Error::DecryptionFailed(e.to_string()))?,
        other => other,
    };

    let content = decrypted
        .get_content()
        .map_err(|e| Error::DecryptionFailed(e.to_string()))?
        .ok_or_else(|| Error::DecryptionFailed("message carries no literal data".into()))?;

    String::from_utf8(content).map_err(|e| Error::DecryptionFailed(e.to_string()))
}

/// The packet a session key is encrypted to for one recipient
///
/// An encryption-capable subkey wins. Keys without one fall back to the
/// primary key when its algorithm can encrypt.
#[derive(Debug)]
enum EncryptionTarget<'a> {
    Primary(&'a SignedPublicKey),
    Subkey(&'a SignedPublicSubKey),
}

impl<'a> EncryptionTarget<'a> {
    fn select(key: &'a SignedPublicKey) -> Result<Self> {
        let subkey = key
            .public_subkeys
            .iter()
            .find(|sub| PublicKeyTrait::is_encryption_key(*sub));
        if let Some(sub) = subkey {
            return Ok(Self::Subkey(sub));
        }
        if PublicKeyTrait::is_encryption_key(key) {
            return Ok(Self::Primary(key));
        }
        Err(Error::InvalidKey("key has no encryption-capable key".into()))
    }
}

impl PublicKeyTrait for EncryptionTarget<'_> {
    fn version(&self) -> KeyVersion {
        match self {
            Self::Primary(key) => PublicKeyTrait::version(*key),
            Self::Subkey(sub) => PublicKeyTrait::version(*sub),
        }
    }

    fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Primary(key) => PublicKeyTrait::fingerprint(*key),
            Self::Subkey(sub) => PublicKeyTrait::fingerprint(*sub),
        }
    }

    fn key_id(&self) -> KeyId {
        match self {
            Self::Primary(key) => PublicKeyTrait::key_id(*key),
            Self::Subkey(sub) => PublicKeyTrait::key_id(*sub),
        }
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            Self::Primary(key) => PublicKeyTrait::algorithm(*key),
            Self::Subkey(sub) => PublicKeyTrait::algorithm(*sub),
        }
    }

    fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        match self {
            Self::Primary(key) => PublicKeyTrait::created_at(*key),
            Self::Subkey(sub) => PublicKeyTrait::created_at(*sub),
        }
    }

    fn expiration(&self) -> Option<u16> {
        match self {
            Self::Primary(key) => PublicKeyTrait::expiration(*key),
            Self::Subkey(sub) => PublicKeyTrait::expiration(*sub),
        }
    }

    fn verify_signature(
        &self,
        hash: HashAlgorithm,
        data: &[u8],
        sig: &SignatureBytes,
    ) -> pgp::errors::Result<()> {
        match self {
            Self::Primary(key) => PublicKeyTrait::verify_signature(*key, hash, data, sig),
            Self::Subkey(sub) => PublicKeyTrait::verify_signature(*sub, hash, data, sig),
        }
    }

    fn encrypt<R: CryptoRng + Rng>(
        &self,
        rng: R,
        plain: &[u8],
        typ: EskType,
    ) -> pgp::errors::Result<PkeskBytes> {
        match self {
            Self::Primary(key) => PublicKeyTrait::encrypt(*key, rng, plain, typ),
            Self::Subkey(sub) => PublicKeyTrait::encrypt(*sub, rng, plain, typ),
        }
    }

    fn serialize_for_hashing(&self, writer: &mut impl std::io::Write) -> pgp::errors::Result<()> {
        match self {
            Self::Primary(key) => PublicKeyTrait::serialize_for_hashing(*key, writer),
            Self::Subkey(sub) => PublicKeyTrait::serialize_for_hashing(*sub, writer),
        }
    }

    fn public_params(&self) -> &PublicParams {
        match self {
            Self::Primary(key) => PublicKeyTrait::public_params(*key),
            Self::Subkey(sub) => PublicKeyTrait::public_params(*sub),
        }
    }
}

// ============================================================================
// ASYNC API
// ============================================================================

/// Encrypt on the blocking pool
pub async fn encrypt(public_key_armored: &str, plaintext: &str) -> Result<String> {
    let key = public_key_armored.to_string();
    let plaintext = zeroize::Zeroizing::new(plaintext.to_string());

    super::offload(move || encrypt_message(&key, plaintext.as_str())).await
}

/// Encrypt to several recipients on the blocking pool
pub async fn encrypt_to_many(public_keys_armored: &[String], plaintext: &str) -> Result<String> {
    let keys = public_keys_armored.to_vec();
    let plaintext = zeroize::Zeroizing::new(plaintext.to_string());

    super::offload(move || {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        encrypt_message_to_many(&refs, plaintext.as_str())
    })
    .await
}

/// Decrypt on the blocking pool
///
/// The pass-through branch is answered without leaving the caller's task.
pub async fn decrypt(
    private_key_armored: &str,
    passphrase: &str,
    armored_input: &str,
) -> Result<String> {
    if !is_armored(armored_input) {
        return Ok(armored_input.to_string());
    }

    let key = zeroize::Zeroizing::new(private_key_armored.to_string());
    let passphrase = zeroize::Zeroizing::new(passphrase.to_string());
    let input = armored_input.to_string();

    super::offload(move || decrypt_message(key.as_str(), passphrase.as_str(), &input)).await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_armored() {
        assert!(is_armored("-----BEGIN PGP MESSAGE-----"));
        assert!(!is_armored("hello there"));
        assert!(!is_armored(""));
    }

    #[test]
    fn test_plaintext_passes_through() {
        let out = decrypt_message("not a key", "wrong", "just some legacy text").unwrap();
        assert_eq!(out, "just some legacy text");
    }

    #[test]
    fn test_empty_input_passes_through() {
        assert_eq!(decrypt_message("", "", "").unwrap(), "");
    }

    #[test]
    fn test_malformed_message() {
        let input = "-----BEGIN PGP MESSAGE-----\n\n!!!!\n-----END PGP MESSAGE-----\n";
        let err = decrypt_message("not a key", "secret", input).unwrap_err();

        assert!(matches!(err, Error::MalformedMessage(_)), "got {:?}", err);
    }

    #[test]
    fn test_encrypt_with_garbage_key() {
        let err = encrypt_message("definitely not a key", "hello").unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn test_encrypt_without_recipients() {
        let err = encrypt_message_to_many(&[], "hello").unwrap_err();
        assert!(matches!(err, Error::EncryptionFailed(_)));
    }

    #[tokio::test]
    async fn test_async_pass_through() {
        let out = decrypt("irrelevant", "irrelevant", "hi Bob").await.unwrap();
        assert_eq!(out, "hi Bob");
    }
}
