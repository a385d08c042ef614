//! # Messaging Module
//!
//! Sending and rendering the shared conversation.
//!
//! ## Send Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SENDING A MESSAGE                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender (Alice, logged in)                                             │
//! │                                                                         │
//! │  Input: "Hello Bob!"                                                   │
//! │                                                                         │
//! │  1. Encrypt to both parties                                            │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  encrypt_to_many([bob_public, alice_public], text)         │       │
//! │  │  → "-----BEGIN PGP MESSAGE----- ..."                       │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  2. Scramble for onlookers                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  scramble("Hello Bob!") → "Qmxvt Lap!"                     │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  3. Stamp and persist                                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Message { id: uuid, text, scrambled, user, sent_at }      │       │
//! │  │  store.insert_message(...)                                  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Render Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RENDERING A CONVERSATION                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  store.list_messages() ──► drop empty text                             │
//! │                                │                                        │
//! │            ┌───────────────────┼───────────────────┐                    │
//! │            ▼                   ▼                   ▼                    │
//! │       decrypt(m1)         decrypt(m2)         decrypt(m3)   (parallel) │
//! │            │                   │                   │                    │
//! │            ▼                   ▼                   ▼                    │
//! │   Decrypted / Plaintext / Failed("ERROR"), each tagged with its id     │
//! │                                                                         │
//! │  Without a session (observer_view) ciphertext shows as scrambled.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, is_armored, scramble};
use crate::error::{Error, Result};
use crate::identity::{Session, UserIdentity};
use crate::storage::Store;

/// Text shown in place of a message that failed to decrypt
pub const ERROR_SENTINEL: &str = "ERROR";

/// Maximum plaintext size accepted by `send` (64KB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// A persisted chat message
///
/// `text` is either plaintext or an armored OpenPGP message; the two are
/// told apart by [`is_armored`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Plaintext or armored ciphertext
    pub text: String,
    /// Scrambled form of the plaintext
    pub scrambled: String,
    /// Author
    pub user: UserIdentity,
    /// Unix timestamp when sent (milliseconds)
    pub sent_at: i64,
}

impl Message {
    /// Check if this message was written by `identity`
    pub fn is_from(&self, identity: &UserIdentity) -> bool {
        &self.user == identity
    }

    /// Whether the stored text is ciphertext
    pub fn is_encrypted(&self) -> bool {
        is_armored(&self.text)
    }
}

/// How a rendered message body was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Ciphertext decrypted with the session's key
    Decrypted,
    /// Stored without encryption
    Plaintext,
    /// Ciphertext shown as its scrambled form
    Scrambled,
    /// Decryption failed; body is [`ERROR_SENTINEL`]
    Failed,
}

impl MessageStatus {
    /// Short label for display
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decrypted => "decrypted",
            Self::Plaintext => "plaintext",
            Self::Scrambled => "scrambled",
            Self::Failed => "failed",
        }
    }
}

/// A message ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// ID of the source message
    pub id: String,
    /// Author
    pub user: UserIdentity,
    /// Unix timestamp when sent (milliseconds)
    pub sent_at: i64,
    /// Body to show
    pub body: String,
    /// How `body` was obtained
    pub status: MessageStatus,
    /// Whether the viewer wrote it
    pub is_own: bool,
}

impl RenderedMessage {
    fn from_message(message: Message, body: String, status: MessageStatus, is_own: bool) -> Self {
        Self {
            id: message.id,
            user: message.user,
            sent_at: message.sent_at,
            body,
            status,
            is_own,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// CHAT SERVICE
// ============================================================================

/// Sends and renders messages against a [`Store`]
pub struct ChatService {
    store: Arc<dyn Store>,
}

impl ChatService {
    /// Create a chat service over a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Encrypt `text` to the recipient and to the sender, then persist it
    pub async fn send(
        &self,
        session: &Session,
        recipient_public_key: &str,
        text: &str,
    ) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::InvalidMessageContent("message is empty".into()));
        }
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidMessageContent(format!(
                "message is {} bytes, limit is {}",
                text.len(),
                MAX_MESSAGE_SIZE
            )));
        }

        let mut recipients = vec![recipient_public_key.to_string()];
        if recipient_public_key != session.public_key() {
            recipients.push(session.public_key().to_string());
        }

        let ciphertext = crypto::encrypt_to_many(&recipients, text).await?;

        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: ciphertext,
            scrambled: scramble(text),
            user: session.identity().clone(),
            sent_at: crate::time::now_timestamp_millis(),
        };

        self.store.insert_message(&message).await?;

        tracing::debug!("Stored message {}", message.id);
        Ok(message)
    }

    /// Store a message as-is, without encryption
    ///
    /// Such messages render as [`MessageStatus::Plaintext`] for everyone.
    pub async fn send_plaintext(&self, user: &UserIdentity, text: &str) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::InvalidMessageContent("message is empty".into()));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            scrambled: scramble(text),
            user: user.clone(),
            sent_at: crate::time::now_timestamp_millis(),
        };

        self.store.insert_message(&message).await?;
        Ok(message)
    }

    /// Every non-empty message, decrypted with the session's key
    ///
    /// Decryption runs concurrently. A message that fails to decrypt is
    /// rendered as [`ERROR_SENTINEL`] and does not affect the others.
    pub async fn conversation(&self, session: &Session) -> Result<Vec<RenderedMessage>> {
        let messages = self.load_non_empty().await?;

        let rendered = join_all(
            messages
                .into_iter()
                .map(|message| render_for_session(session, message)),
        )
        .await;

        let failed = rendered
            .iter()
            .filter(|m| m.status == MessageStatus::Failed)
            .count();
        if failed > 0 {
            tracing::warn!("{} of {} messages failed to decrypt", failed, rendered.len());
        }

        Ok(rendered)
    }

    /// Every non-empty message as seen without any key
    pub async fn observer_view(&self) -> Result<Vec<RenderedMessage>> {
        let messages = self.load_non_empty().await?;

        Ok(messages
            .into_iter()
            .map(|message| {
                if message.is_encrypted() {
                    let body = message.scrambled.clone();
                    RenderedMessage::from_message(message, body, MessageStatus::Scrambled, false)
                } else {
                    let body = message.text.clone();
                    RenderedMessage::from_message(message, body, MessageStatus::Plaintext, false)
                }
            })
            .collect())
    }

    async fn load_non_empty(&self) -> Result<Vec<Message>> {
        let mut messages = self.store.list_messages().await?;
        messages.retain(|m| !m.text.is_empty());
        Ok(messages)
    }
}

async fn render_for_session(session: &Session, message: Message) -> RenderedMessage {
    let is_own = message.is_from(session.identity());

    if !message.is_encrypted() {
        let body = message.text.clone();
        return RenderedMessage::from_message(message, body, MessageStatus::Plaintext, is_own);
    }

    match crypto::decrypt(session.private_key(), session.passphrase(), &message.text).await {
        Ok(plaintext) => {
            RenderedMessage::from_message(message, plaintext, MessageStatus::Decrypted, is_own)
        }
        Err(e) => {
            tracing::warn!("Failed to decrypt message {}: {}", message.id, e);
            RenderedMessage::from_message(
                message,
                ERROR_SENTINEL.to_string(),
                MessageStatus::Failed,
                is_own,
            )
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
