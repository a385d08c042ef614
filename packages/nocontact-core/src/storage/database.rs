//! # Database
//!
//! SQLite implementation of [`Store`].
//!
//! ## Capped Insert
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   insert_hashed_identity(record, max)                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  lock connection                                                       │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  BEGIN IMMEDIATE        ◄── takes the write lock, so other processes   │
//! │     │                       sharing the file wait here too             │
//! │     ▼                                                                   │
//! │  SELECT COUNT(*) ── >= max ──► ROLLBACK, RegistrationFull              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  INSERT ──► COMMIT                                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;

use super::{schema, Store};
use crate::crypto::HashedString;
use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::messaging::Message;
use crate::registration::HashedIdentity;

/// The main database handle
#[derive(Clone)]
pub struct Database {
    /// The underlying SQLite connection
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    /// Missing parent directories of a file path are created.
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => {
                if let Some(parent) = Path::new(p).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Connection::open(p)
                    .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?
            }
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        // Only a missing table or row means a fresh database
        let version: Option<i32> = match conn.query_row(
            "SELECT version FROM schema_version LIMIT 1",
            [],
            |row| row.get(0),
        ) {
            Ok(v) => Some(v),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) if e.to_string().contains("no such table") => None,
            Err(e) => {
                return Err(Error::DatabaseError(format!(
                    "Failed to read schema version: {}",
                    e
                )))
            }
        };

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES).map_err(|e| {
                    Error::DatabaseError(format!("Failed to create tables: {}", e))
                })?;

                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| {
                    Error::DatabaseError(format!("Failed to set schema version: {}", e))
                })?;

                tracing::info!(
                    "Database schema created (version {})",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::StorageCorrupted(format!(
                    "database schema version {} is newer than supported version {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Database schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // MESSAGE OPERATIONS
    // ========================================================================

    /// Store a message
    pub fn store_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO messages (id, text, scrambled, user_name, user_id, sent_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                message.id,
                message.text,
                message.scrambled,
                message.user.name,
                message.user.id,
                message.sent_at,
            ],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to store message: {}", e)))?;

        Ok(())
    }

    /// Get all messages, oldest first
    pub fn get_messages(&self) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, text, scrambled, user_name, user_id, sent_at
                 FROM messages ORDER BY sent_at, seq",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    scrambled: row.get(2)?,
                    user: UserIdentity {
                        name: row.get(3)?,
                        id: row.get(4)?,
                    },
                    sent_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(|e| {
                Error::StorageCorrupted(format!("Failed to read message row: {}", e))
            })?);
        }

        Ok(messages)
    }

    // ========================================================================
    // IDENTITY OPERATIONS
    // ========================================================================

    /// Insert a hashed identity if fewer than `max` exist
    pub fn add_hashed_identity(&self, identity: &HashedIdentity, max: usize) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let count: i64 = tx
            .query_row("SELECT COUNT(*) FROM hashed_identities", [], |row| row.get(0))
            .map_err(|e| Error::DatabaseError(format!("Failed to count identities: {}", e)))?;

        if count as usize >= max {
            // Dropping the transaction rolls it back
            tracing::debug!("Rejecting identity insert: {} of {} slots used", count, max);
            return Err(Error::RegistrationFull);
        }

        tx.execute(
            "INSERT INTO hashed_identities (id, name_hash, name_salt, email_hash, email_salt, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                identity.id,
                identity.name.hash,
                identity.name.salt,
                identity.email.hash,
                identity.email.salt,
                identity.created_at,
            ],
        )
        .map_err(|e| Error::DatabaseError(format!("Failed to add identity: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::DatabaseError(format!("Failed to commit identity: {}", e)))?;

        Ok(())
    }

    /// Get all hashed identities
    pub fn get_hashed_identities(&self) -> Result<Vec<HashedIdentity>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name_hash, name_salt, email_hash, email_salt, created_at
                 FROM hashed_identities ORDER BY created_at",
            )
            .map_err(|e| Error::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(HashedIdentity {
                    id: row.get(0)?,
                    name: HashedString {
                        hash: row.get(1)?,
                        salt: row.get(2)?,
                    },
                    email: HashedString {
                        hash: row.get(3)?,
                        salt: row.get(4)?,
                    },
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::DatabaseError(format!("Failed to query identities: {}", e)))?;

        let mut identities = Vec::new();
        for row in rows {
            identities.push(row.map_err(|e| {
                Error::StorageCorrupted(format!("Failed to read identity row: {}", e))
            })?);
        }

        Ok(identities)
    }

    /// Count hashed identities
    pub fn hashed_identity_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM hashed_identities", [], |row| row.get(0))
            .map_err(|e| Error::DatabaseError(format!("Failed to count identities: {}", e)))?;

        Ok(count as usize)
    }
}

#[async_trait]
impl Store for Database {
    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.store_message(message)
    }

    async fn list_messages(&self) -> Result<Vec<Message>> {
        self.get_messages()
    }

    async fn insert_hashed_identity(
        &self,
        identity: &HashedIdentity,
        max_identities: usize,
    ) -> Result<()> {
        self.add_hashed_identity(identity, max_identities)
    }

    async fn list_hashed_identities(&self) -> Result<Vec<HashedIdentity>> {
        self.get_hashed_identities()
    }

    async fn count_hashed_identities(&self) -> Result<usize> {
        self.hashed_identity_count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
