//! # Database Schema
//!
//! SQL schema definitions for the NoContact database.
//!
//! ## Schema Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         DATABASE SCHEMA                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────┐            ┌─────────────────┐                   │
//! │  │ hashed_identities │            │    messages     │                   │
//! │  ├───────────────────┤            ├─────────────────┤                   │
//! │  │ id                │            │ seq             │                   │
//! │  │ name_hash         │            │ id              │                   │
//! │  │ name_salt         │            │ text            │                   │
//! │  │ email_hash        │            │ scrambled       │                   │
//! │  │ email_salt        │            │ user_name       │                   │
//! │  │ created_at        │            │ user_id         │                   │
//! │  └───────────────────┘            │ sent_at         │                   │
//! │   (at most 2 rows)                └─────────────────┘                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Registered identities, stored only as salted hashes
CREATE TABLE IF NOT EXISTS hashed_identities (
    id TEXT PRIMARY KEY,
    -- Argon2id digest and salt of the display name (hex)
    name_hash TEXT NOT NULL,
    name_salt TEXT NOT NULL,
    -- Argon2id digest and salt of the email address (hex)
    email_hash TEXT NOT NULL,
    email_salt TEXT NOT NULL,
    -- Unix milliseconds
    created_at INTEGER NOT NULL
);

-- Chat messages
-- `text` is either plaintext or an armored OpenPGP message
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL,
    scrambled TEXT NOT NULL,
    -- Sender identity as derived from their public key
    user_name TEXT NOT NULL,
    user_id TEXT NOT NULL,
    -- Unix milliseconds
    sent_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_sent_at ON messages(sent_at);
"#;
