//! # Storage Module
//!
//! The persistence collaborator behind registration and chat.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Registry ──┐                                                           │
//! │             ├──► dyn Store ──► Database (SQLite, file or in-memory)    │
//! │  ChatService┘                                                           │
//! │                                                                         │
//! │  The store is an append-and-scan document store:                       │
//! │  • messages          insert / list                                     │
//! │  • hashed identities insert (capped, atomic) / list / count            │
//! │                                                                         │
//! │  Nothing stored here is secret: messages are ciphertext or scrambled   │
//! │  text, identities are salted hashes.                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod database;
mod schema;

pub use database::Database;

use async_trait::async_trait;

use crate::error::Result;
use crate::messaging::Message;
use crate::registration::HashedIdentity;

/// Persistence operations the core needs
///
/// Implementations must make [`Store::insert_hashed_identity`] atomic with
/// respect to its count check: two concurrent inserts racing for the last
/// slot must not both succeed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a message
    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// All messages, oldest first
    async fn list_messages(&self) -> Result<Vec<Message>>;

    /// Insert an identity unless `max_identities` are already stored
    ///
    /// Fails with `Error::RegistrationFull` when the cap is reached.
    async fn insert_hashed_identity(
        &self,
        identity: &HashedIdentity,
        max_identities: usize,
    ) -> Result<()>;

    /// All registered identities
    async fn list_hashed_identities(&self) -> Result<Vec<HashedIdentity>>;

    /// Number of registered identities
    async fn count_hashed_identities(&self) -> Result<usize>;
}
