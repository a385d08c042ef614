//! # Registration & Verification
//!
//! The two-seat registry: who may join the chat, and whether an uploaded key
//! pair belongs to someone who did.
//!
//! ## Registration State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      REGISTRATION STATES                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌──────────────┐  register   ┌──────────────┐  register  ┌────────┐  │
//! │   │ Open (0 used)│────────────►│ Open (1 used)│───────────►│  Full  │  │
//! │   └──────────────┘             └──────────────┘            └───┬────┘  │
//! │                                                                │       │
//! │                                       register ──► RegistrationFull   │
//! │                                       (no state change, no keys)       │
//! │                                                                         │
//! │   The cap is enforced by the store's atomic capped insert; the         │
//! │   count check up front only avoids generating keys that would be       │
//! │   thrown away.                                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Login
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            LOGIN                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  public.pgp ──► extract_identity ──None──► InvalidCredentials          │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  [optional] private.pgp parses, unlocks, same fingerprint              │
//! │                       │         └──fail──► InvalidCredentials          │
//! │                       ▼                                                 │
//! │  for each HashedIdentity:                                              │
//! │     verify(name) AND verify(email) ──any──► Session (verified)         │
//! │                       │                                                 │
//! │                       └──none──► InvalidCredentials                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Without `require_key_possession` a login only proves that the public key
//! names a registered identity. Anyone can mint a key with a matching
//! `Name <email>` string, so deployments that care should turn the check on.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::crypto::{
    self, generate_key_pair, hash_string, is_matching_pair, parse_private_key, parse_public_key,
    unlock_private_key, verify_hashed_string, HashedString, HashingConfig, KeyGenConfig, KeyPair,
};
use crate::error::{Error, Result};
use crate::identity::{extract_identity_async, Session, UserIdentity};
use crate::storage::Store;

/// Seats in a chat
pub const MAX_IDENTITIES: usize = 2;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("email pattern is valid")
});

/// A registered user, stored as salted hashes only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedIdentity {
    /// Record id
    pub id: String,
    /// Hashed display name
    pub name: HashedString,
    /// Hashed email
    pub email: HashedString,
    /// Unix milliseconds
    pub created_at: i64,
}

impl HashedIdentity {
    /// Hash a name and email under fresh salts
    pub fn new(name: &str, email: &str, config: &HashingConfig) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: hash_string(name, config)?,
            email: hash_string(email, config)?,
            created_at: crate::time::now_timestamp_millis(),
        })
    }

    /// Whether both fields of `identity` verify against this record
    ///
    /// Both digests are always computed.
    pub fn matches(&self, identity: &UserIdentity, config: &HashingConfig) -> bool {
        let name_ok = verify_hashed_string(&identity.name, &self.name.hash, &self.name.salt, config);
        let email_ok =
            verify_hashed_string(&identity.id, &self.email.hash, &self.email.salt, config);
        name_ok & email_ok
    }
}

/// Whether new users can still register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Seats are left
    Open {
        /// Seats left
        remaining: usize,
    },
    /// Both seats are taken
    Full,
}

/// Registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Parameters for keys handed out at registration
    pub key_generation: KeyGenConfig,
    /// Parameters for identity hashes
    pub hashing: HashingConfig,
    /// Require the uploaded private key to unlock and match the public key
    pub require_key_possession: bool,
}

/// Registration and login against a [`Store`]
pub struct Registry {
    store: Arc<dyn Store>,
    config: RegistryConfig,
}

impl Registry {
    /// Create a registry over a store
    pub fn new(store: Arc<dyn Store>, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    /// The configuration in use
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current registration state
    pub async fn state(&self) -> Result<RegistrationState> {
        let used = self.store.count_hashed_identities().await?;
        Ok(if used >= MAX_IDENTITIES {
            RegistrationState::Full
        } else {
            RegistrationState::Open {
                remaining: MAX_IDENTITIES - used,
            }
        })
    }

    /// Store the hashed identity of a user whose keys were made elsewhere
    ///
    /// The client keeps its key pair; only the hashes reach the store.
    pub async fn enroll(&self, name: &str, email: &str) -> Result<HashedIdentity> {
        let (name, email) = validate_registration(name, email)?;
        let config = self.config.hashing.clone();

        let record = crypto::offload(move || HashedIdentity::new(&name, &email, &config)).await?;

        self.store
            .insert_hashed_identity(&record, MAX_IDENTITIES)
            .await?;

        tracing::info!("Registered identity {}", record.id);
        Ok(record)
    }

    /// Register a user and hand back a fresh key pair for download
    ///
    /// Fails with `RegistrationFull` when both seats are taken, before any
    /// key is generated.
    pub async fn register(&self, name: &str, email: &str, passphrase: &str) -> Result<KeyPair> {
        let (key_pair, ()) = self
            .register_staged(name, email, passphrase, |_| Ok(()))
            .await?;
        Ok(key_pair)
    }

    /// [`register`](Self::register), with the key pair handed to `stage`
    /// before a seat is taken
    ///
    /// If `stage` fails the seat stays free. If the seat is lost afterwards
    /// the staged value is dropped, so `stage` should return a guard that
    /// undoes its work on drop.
    pub async fn register_staged<T, F>(
        &self,
        name: &str,
        email: &str,
        passphrase: &str,
        stage: F,
    ) -> Result<(KeyPair, T)>
    where
        F: FnOnce(&KeyPair) -> Result<T>,
    {
        let (name, email) = validate_registration(name, email)?;

        if self.state().await? == RegistrationState::Full {
            tracing::info!("Registration rejected: chat is full");
            return Err(Error::RegistrationFull);
        }

        let key_pair =
            generate_key_pair(&name, &email, passphrase, &self.config.key_generation).await?;

        let staged = stage(&key_pair)?;

        // Another registration may have taken the last seat while the keys
        // were generating; the capped insert settles it.
        self.enroll(&name, &email).await?;

        Ok((key_pair, staged))
    }

    /// Log in with an uploaded key pair
    ///
    /// Every failure is reported as `InvalidCredentials`.
    pub async fn login(
        &self,
        public_key: &str,
        private_key: &str,
        passphrase: &str,
    ) -> Result<Session> {
        let identity = extract_identity_async(public_key)
            .await
            .ok_or(Error::InvalidCredentials)?;

        if self.config.require_key_possession {
            if let Err(e) = check_key_possession(public_key, private_key, passphrase).await {
                tracing::debug!("Key possession check failed: {}", e);
                return Err(Error::InvalidCredentials);
            }
        }

        let records = self.store.list_hashed_identities().await?;
        let config = self.config.hashing.clone();
        let candidate = identity.clone();

        let matched = crypto::offload(move || {
            Ok(records
                .iter()
                .find(|record| record.matches(&candidate, &config))
                .map(|record| record.id.clone()))
        })
        .await?;

        match matched {
            Some(record_id) => {
                tracing::info!("Login verified against identity {}", record_id);
                Ok(Session::new(identity, public_key, private_key, passphrase, true))
            }
            None => {
                tracing::info!("Login rejected");
                Err(Error::InvalidCredentials)
            }
        }
    }
}

/// Trim and check registration input
///
/// Returns the trimmed name and email.
pub fn validate_registration(name: &str, email: &str) -> Result<(String, String)> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return Err(Error::InvalidRegistration("name is required".into()));
    }
    if name.contains(['<', '>']) {
        return Err(Error::InvalidRegistration(
            "name must not contain angle brackets".into(),
        ));
    }
    if !EMAIL_REGEX.is_match(email) || email.contains(['<', '>', ' ']) {
        return Err(Error::InvalidRegistration(
            "email address is not valid".into(),
        ));
    }

    Ok((name.to_string(), email.to_string()))
}

async fn check_key_possession(public_key: &str, private_key: &str, passphrase: &str) -> Result<()> {
    let public_key = public_key.to_string();
    let private_key = zeroize::Zeroizing::new(private_key.to_string());
    let passphrase = zeroize::Zeroizing::new(passphrase.to_string());

    crypto::offload(move || {
        let public = parse_public_key(&public_key)?;
        let secret = parse_private_key(private_key.as_str())?;
        unlock_private_key(&secret, passphrase.as_str())?;

        if !is_matching_pair(&public, &secret) {
            return Err(Error::InvalidKey(
                "private key does not belong to the public key".into(),
            ));
        }
        Ok(())
    })
    .await
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn fast_hashing() -> HashingConfig {
        HashingConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            salt_len: 16,
        }
    }

    async fn test_registry() -> Registry {
        let db = Database::open(None).await.unwrap();
        Registry::new(
            Arc::new(db),
            RegistryConfig {
                hashing: fast_hashing(),
                ..RegistryConfig::default()
            },
        )
    }

    #[test]
    fn test_validate_registration() {
        let (name, email) = validate_registration(" Alice ", "alice@example.com ").unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(email, "alice@example.com");

        assert!(validate_registration("", "alice@example.com").is_err());
        assert!(validate_registration("Alice", "alice").is_err());
        assert!(validate_registration("Alice", "alice@localhost").is_err());
        assert!(validate_registration("Al<ice>", "alice@example.com").is_err());
        assert!(validate_registration("Alice", "\"a <b>\"@example.com").is_err());
    }

    #[test]
    fn test_hashed_identity_matches() {
        let config = fast_hashing();
        let record = HashedIdentity::new("Alice", "alice@example.com", &config).unwrap();

        assert!(record.matches(&UserIdentity::new("Alice", "alice@example.com"), &config));
        assert!(!record.matches(&UserIdentity::new("Alice", "alice@evil.example"), &config));
        assert!(!record.matches(&UserIdentity::new("Mallory", "alice@example.com"), &config));
    }

    #[test]
    fn test_hashed_identity_stores_no_plaintext() {
        let record = HashedIdentity::new("Alice", "alice@example.com", &fast_hashing()).unwrap();
        let json = serde_json::to_string(&record).unwrap();

        assert!(!json.contains("Alice"));
        assert!(!json.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let registry = test_registry().await;

        assert_eq!(
            registry.state().await.unwrap(),
            RegistrationState::Open { remaining: 2 }
        );

        registry.enroll("Alice", "alice@example.com").await.unwrap();
        assert_eq!(
            registry.state().await.unwrap(),
            RegistrationState::Open { remaining: 1 }
        );

        registry.enroll("Bob", "bob@example.com").await.unwrap();
        assert_eq!(registry.state().await.unwrap(), RegistrationState::Full);
    }

    #[tokio::test]
    async fn test_third_enrollment_rejected() {
        let registry = test_registry().await;
        registry.enroll("Alice", "alice@example.com").await.unwrap();
        registry.enroll("Bob", "bob@example.com").await.unwrap();

        let err = registry
            .enroll("Carol", "carol@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RegistrationFull));
        assert_eq!(registry.store.count_hashed_identities().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_register_when_full_generates_nothing() {
        let registry = test_registry().await;
        registry.enroll("Alice", "alice@example.com").await.unwrap();
        registry.enroll("Bob", "bob@example.com").await.unwrap();

        // Full is detected before the (slow) key generation would start
        let err = registry
            .register("Carol", "carol@example.com", "carol's passphrase")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RegistrationFull));
        assert_eq!(registry.store.count_hashed_identities().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_register_staged_when_full_never_stages() {
        let registry = test_registry().await;
        registry.enroll("Alice", "alice@example.com").await.unwrap();
        registry.enroll("Bob", "bob@example.com").await.unwrap();

        let err = registry
            .register_staged("Carol", "carol@example.com", "pw", |_| -> Result<()> {
                panic!("staged while full")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationFull));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email_before_anything() {
        let registry = test_registry().await;

        let err = registry
            .register("Alice", "not-an-email", "passphrase")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRegistration(_)));
        assert_eq!(registry.store.count_hashed_identities().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_fill_exactly_two_seats() {
        let registry = Arc::new(test_registry().await);

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .enroll(&format!("User {}", i), &format!("user{}@example.com", i))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        let mut full = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(Error::RegistrationFull) => full += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        assert_eq!(ok, 2);
        assert_eq!(full, 4);
    }

    #[tokio::test]
    async fn test_login_with_garbage_key() {
        let registry = test_registry().await;
        registry.enroll("Alice", "alice@example.com").await.unwrap();

        let err = registry
            .login("not a key", "not a key", "pw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCredentials));
    }
}
