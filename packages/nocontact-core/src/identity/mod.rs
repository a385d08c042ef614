//! # Identity Module
//!
//! Derives a user identity from the `Name <email>` user id embedded in an
//! OpenPGP public key, and carries the per-user key material around as an
//! explicit [`Session`].
//!
//! ## Extraction
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      IDENTITY EXTRACTION                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  public.pgp ──► parse ──fail──► None (logged, not an error)            │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │            user ids: ["Bob <bob@example.com>", ...]                    │
//! │                   │                                                     │
//! │                   ▼  first one only (none ──► None)                    │
//! │            split on " <"                                               │
//! │                   │                                                     │
//! │          ┌────────┴─────────┐                                           │
//! │          ▼                  ▼                                           │
//! │       "Bob"        "bob@example.com>" ──► strip ">"                    │
//! │          │                  │                                           │
//! │          └───────┬──────────┘                                           │
//! │                  ▼                                                      │
//! │     UserIdentity { name: "Bob", id: "bob@example.com" }                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod session;

pub use session::Session;

use serde::{Deserialize, Serialize};

use crate::crypto::parse_public_key;

/// The identity a public key speaks for
///
/// `id` is the email address. Two identities are the same user when both
/// fields match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Display name
    pub name: String,
    /// Email address
    pub id: String,
}

impl UserIdentity {
    /// Create an identity from its parts
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// The user id string as embedded in a key
    pub fn user_id(&self) -> String {
        format!("{} <{}>", self.name, self.id)
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.id)
    }
}

/// Split a `Name <email>` user id
///
/// Returns `None` when the string lacks the `" <"` separator.
pub fn parse_user_id(user_id: &str) -> Option<UserIdentity> {
    let (name, email) = user_id.split_once(" <")?;
    let email = email.strip_suffix('>').unwrap_or(email);

    Some(UserIdentity::new(name, email))
}

/// Identity from the first of a key's user ids
pub fn identity_from_user_ids<'a, I>(user_ids: I) -> Option<UserIdentity>
where
    I: IntoIterator<Item = &'a str>,
{
    user_ids.into_iter().next().and_then(parse_user_id)
}

/// Read the identity embedded in an armored public key
///
/// Unknown identity is `None`: an unparsable key, a key without user ids, or
/// a first user id not shaped like `Name <email>`.
pub fn extract_identity(public_key_armored: &str) -> Option<UserIdentity> {
    let key = match parse_public_key(public_key_armored) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("Error reading public key: {}", e);
            return None;
        }
    };

    // A non UTF-8 first user id is unusable, not skipped
    let user_ids = key
        .details
        .users
        .iter()
        .map(|user| std::str::from_utf8(user.id.id()).unwrap_or_default());
    let identity = identity_from_user_ids(user_ids);
    if identity.is_none() {
        tracing::debug!("Public key has no usable user id");
    }
    identity
}

/// [`extract_identity`] on the blocking pool
pub async fn extract_identity_async(public_key_armored: &str) -> Option<UserIdentity> {
    let key = public_key_armored.to_string();

    crate::crypto::offload(move || Ok(extract_identity(&key)))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Identity extraction task failed: {}", e);
            None
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        let identity = parse_user_id("Bob <bob@example.com>").unwrap();

        assert_eq!(identity.name, "Bob");
        assert_eq!(identity.id, "bob@example.com");
    }

    #[test]
    fn test_parse_user_id_with_spaces_in_name() {
        let identity = parse_user_id("Jon Smith <jon@example.com>").unwrap();

        assert_eq!(identity.name, "Jon Smith");
        assert_eq!(identity.id, "jon@example.com");
    }

    #[test]
    fn test_parse_user_id_without_email() {
        assert_eq!(parse_user_id("Bob"), None);
        assert_eq!(parse_user_id("bob@example.com"), None);
    }

    #[test]
    fn test_first_user_id_wins() {
        let identity = identity_from_user_ids([
            "Alice <alice@example.com>",
            "Alice Work <alice@work.example>",
        ])
        .unwrap();

        assert_eq!(identity, UserIdentity::new("Alice", "alice@example.com"));
    }

    #[test]
    fn test_no_user_ids() {
        assert_eq!(identity_from_user_ids(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_unparsable_key_is_unknown_identity() {
        assert_eq!(extract_identity("hello"), None);
        assert_eq!(
            extract_identity("-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n-----END PGP PUBLIC KEY BLOCK-----"),
            None
        );
    }

    #[test]
    fn test_display_round_trips_user_id() {
        let identity = UserIdentity::new("Bob", "bob@example.com");

        assert_eq!(identity.to_string(), "Bob <bob@example.com>");
        assert_eq!(parse_user_id(&identity.user_id()), Some(identity));
    }

    #[tokio::test]
    async fn test_async_extraction_of_garbage() {
        assert_eq!(extract_identity_async("nope").await, None);
    }
}
