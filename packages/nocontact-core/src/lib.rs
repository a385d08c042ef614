//! # NoContact Core
//!
//! Identity and message confidentiality for a two-party encrypted chat.
//! Users register with a name and email, receive an OpenPGP key pair, and
//! log in later by presenting it. The server side only ever stores salted
//! hashes of identities and ciphertext of messages.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       NOCONTACT CORE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                │
//! │  │ Registration │   │   Identity   │   │  Messaging   │                │
//! │  │              │   │              │   │              │                │
//! │  │ - Register   │   │ - Extract    │   │ - Send       │                │
//! │  │ - Login      │   │ - Session    │   │ - Render     │                │
//! │  │ - Seat cap   │   │              │   │ - Observe    │                │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘                │
//! │         │                  │                  │                         │
//! │         └──────────────────┴──────────────────┘                         │
//! │                            │                                            │
//! │  ┌─────────────────────────┴──┐   ┌───────────────────────────────┐    │
//! │  │          Crypto            │   │           Storage             │    │
//! │  │                            │   │                               │    │
//! │  │ - RSA-4096 OpenPGP keys    │   │ - Store trait                 │    │
//! │  │ - Encrypt / decrypt        │   │ - SQLite (file or memory)     │    │
//! │  │ - Argon2id salted hashes   │   │ - Atomic capped insert        │    │
//! │  │ - Scrambler                │   │                               │    │
//! │  └────────────────────────────┘   └───────────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Keys, message encryption, hashing, scrambling
//! - [`identity`] - Identity extraction and sessions
//! - [`registration`] - The two-seat registry, register and login
//! - [`messaging`] - Sending and rendering messages
//! - [`storage`] - The persistence collaborator
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Message Confidentiality (OpenPGP, RSA + AES-256)             │
//! │  ─────────────────────────────────────────────────────────             │
//! │  Each message is encrypted to the recipient and the sender. The        │
//! │  store holds armored ciphertext plus a scrambled decoy.                │
//! │                                                                         │
//! │  Layer 2: Identity Privacy (Argon2id, per-field salt)                  │
//! │  ─────────────────────────────────────────────────────                 │
//! │  Names and emails are stored only as salted hashes. Login recomputes   │
//! │  and compares in constant time.                                        │
//! │                                                                         │
//! │  Layer 3: Key Protection (passphrase)                                  │
//! │  ─────────────────────────────────────                                 │
//! │  Private keys are encrypted under a per-user passphrase and never      │
//! │  reach the store. Sessions wipe their copies on drop.                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod crypto;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod registration;
pub mod storage;
/// Time utilities.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use crypto::{HashingConfig, KeyGenConfig, KeyPair};
pub use error::{Error, Result};
pub use identity::{extract_identity, Session, UserIdentity};
pub use messaging::{ChatService, Message, MessageStatus, RenderedMessage, ERROR_SENTINEL};
pub use registration::{
    HashedIdentity, RegistrationState, Registry, RegistryConfig, MAX_IDENTITIES,
};
pub use storage::{Database, Store};

// ============================================================================
// CORE INSTANCE
// ============================================================================

use std::sync::Arc;

/// Configuration for opening NoContact Core
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    /// SQLite file path (in-memory if None)
    pub database_path: Option<String>,
    /// Parameters for keys handed out at registration
    pub key_generation: KeyGenConfig,
    /// Parameters for identity hashes
    pub hashing: HashingConfig,
    /// Require the uploaded private key to unlock and match the public key
    /// at login
    pub require_key_possession: bool,
}

impl CoreConfig {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            key_generation: self.key_generation.clone(),
            hashing: self.hashing.clone(),
            require_key_possession: self.require_key_possession,
        }
    }
}

/// The registry and chat service wired to one store
///
/// ## Lifecycle
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                      NOCONTACT CORE LIFECYCLE                           │
/// ├─────────────────────────────────────────────────────────────────────────┤
/// │                                                                         │
/// │  1. Open                                                                │
/// │     ┌─────────────┐                                                    │
/// │     │ NoContact:: │──► Open database (file or memory)                  │
/// │     │ open()      │──► Create or check schema                          │
/// │     └─────────────┘                                                    │
/// │            │                                                           │
/// │            ▼                                                           │
/// │  2. Register (while seats remain)                                      │
/// │     ┌─────────────┐                                                    │
/// │     │ registry()  │──► Hash name and email, store the hashes           │
/// │     │ .register() │──► Generate and return the key pair                │
/// │     └─────────────┘                                                    │
/// │            │                                                           │
/// │            ▼                                                           │
/// │  3. Login                                                              │
/// │     ┌─────────────┐                                                    │
/// │     │ registry()  │──► Extract identity from the public key            │
/// │     │ .login()    │──► Verify against stored hashes                    │
/// │     └─────────────┘──► Session                                         │
/// │            │                                                           │
/// │            ▼                                                           │
/// │  4. Chat                                                               │
/// │     ┌─────────────┐                                                    │
/// │     │ chat()      │◄─► send(session, recipient, text)                  │
/// │     │             │◄─► conversation(session)                           │
/// │     └─────────────┘                                                    │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub struct NoContact {
    store: Arc<dyn Store>,
    registry: Registry,
    chat: ChatService,
}

impl NoContact {
    /// Open the SQLite store named by `config` and wire the services to it
    ///
    /// ## Example
    ///
    /// ```ignore
    /// use nocontact_core::{CoreConfig, NoContact};
    ///
    /// let core = NoContact::open(CoreConfig::default()).await?;
    /// let keys = core.registry().register("Alice", "alice@example.com", "pw").await?;
    /// ```
    pub async fn open(config: CoreConfig) -> Result<Self> {
        tracing::info!("Opening NoContact Core v{}", env!("CARGO_PKG_VERSION"));

        let database = Database::open(config.database_path.as_deref()).await?;
        Ok(Self::with_store(Arc::new(database), config))
    }

    /// Wire the services to an existing store
    pub fn with_store(store: Arc<dyn Store>, config: CoreConfig) -> Self {
        Self {
            registry: Registry::new(store.clone(), config.registry_config()),
            chat: ChatService::new(store.clone()),
            store,
        }
    }

    /// Registration and login
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sending and reading messages
    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    /// The shared store
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Whether seats remain
    pub async fn registration_state(&self) -> Result<RegistrationState> {
        self.registry.state().await
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of NoContact Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::OS,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target operating system
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================
