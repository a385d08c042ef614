//! # Error Handling
//!
//! Error types for NoContact Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Identity Errors                                                   │
//! │  │   ├── RegistrationFull      - Both chat seats are taken             │
//! │  │   ├── InvalidCredentials    - Login rejected (no detail given)      │
//! │  │   └── InvalidRegistration   - Name/email rejected at signup         │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── InvalidKey            - Armored key could not be parsed       │
//! │  │   ├── WrongPassphrase       - Private key would not unlock          │
//! │  │   ├── MalformedMessage      - Armored message could not be parsed   │
//! │  │   ├── DecryptionFailed      - Wrong key or corrupt ciphertext       │
//! │  │   ├── EncryptionFailed      - Encryption primitive failed           │
//! │  │   ├── KeyGenerationFailed   - Key generation primitive failed       │
//! │  │   └── HashingFailed         - Salted hash could not be computed     │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── DatabaseError         - SQLite failure                        │
//! │  │   └── StorageCorrupted      - Stored row failed to decode           │
//! │  │                                                                      │
//! │  ├── Message Errors                                                    │
//! │  │   └── InvalidMessageContent - Empty or unusable message             │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── TaskFailed            - Blocking crypto task panicked         │
//! │      └── SerializationError    - JSON encode/decode failure            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Leaking
//!
//! `RegistrationFull` and `InvalidCredentials` carry no payload. A login that
//! fails because the key was unreadable looks exactly like one that fails
//! because a hash did not match.

use thiserror::Error;

/// Result type alias for NoContact Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for NoContact Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Identity Errors (200-299)
    // ========================================================================

    /// Both registration slots are already used
    #[error("Registration is closed: this chat already has two members.")]
    RegistrationFull,

    /// Login identity did not match any registered identity
    #[error("Invalid credentials.")]
    InvalidCredentials,

    /// Name or email rejected before hashing
    #[error("Invalid registration details: {0}")]
    InvalidRegistration(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Armored key material could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The passphrase did not unlock the private key
    #[error("Wrong passphrase for private key.")]
    WrongPassphrase,

    /// The armored message envelope could not be parsed
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Decryption failed (wrong key or corrupted ciphertext)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// The key generation primitive failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Salted hashing failed
    #[error("Hashing failed: {0}")]
    HashingFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored row could not be decoded
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Message Errors (700-799)
    // ========================================================================

    /// Invalid message content
    #[error("Invalid message content: {0}")]
    InvalidMessageContent(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// A blocking task was cancelled or panicked
    #[error("Background task failed: {0}")]
    TaskFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error (key files, database files)
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Get a stable numeric error code
    ///
    /// Error codes are organized by category:
    /// - 200-299: Identity / registration
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 700-799: Messages
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Identity (200-299)
            Error::RegistrationFull => 200,
            Error::InvalidCredentials => 201,
            Error::InvalidRegistration(_) => 202,

            // Crypto (300-399)
            Error::InvalidKey(_) => 300,
            Error::WrongPassphrase => 301,
            Error::MalformedMessage(_) => 302,
            Error::DecryptionFailed(_) => 303,
            Error::EncryptionFailed(_) => 304,
            Error::KeyGenerationFailed(_) => 305,
            Error::HashingFailed(_) => 306,

            // Storage (400-499)
            Error::DatabaseError(_) => 400,
            Error::StorageCorrupted(_) => 401,

            // Messages (700-799)
            Error::InvalidMessageContent(_) => 700,

            // Internal (900-999)
            Error::TaskFailed(_) => 900,
            Error::SerializationError(_) => 901,
            Error::Io(_) => 902,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can be fixed by the user supplying different
    /// input (another key file, the right passphrase).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey(_)
                | Error::WrongPassphrase
                | Error::InvalidCredentials
                | Error::InvalidRegistration(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskFailed(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
