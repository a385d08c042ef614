//! # Session
//!
//! The key material one user works with, passed explicitly to every chat
//! operation instead of living in shared global state.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            SESSION                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  identity      UserIdentity   derived from public_key                  │
//! │  public_key    armored        shared freely                            │
//! │  private_key   armored        zeroized on drop                         │
//! │  passphrase    secret         zeroized on drop                         │
//! │  verified      bool           true only when issued by Registry::login │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use zeroize::Zeroizing;

use super::{extract_identity, UserIdentity};
use crate::error::{Error, Result};

/// A user's key material for the lifetime of a chat
pub struct Session {
    identity: UserIdentity,
    public_key: String,
    private_key: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    verified: bool,
}

impl Session {
    /// Open an unverified session from key file contents
    ///
    /// Only the public key is inspected; it must carry a `Name <email>` user
    /// id. Use `Registry::login` to get a session checked against the
    /// registered identities.
    pub fn open(public_key: &str, private_key: &str, passphrase: &str) -> Result<Self> {
        let identity = extract_identity(public_key)
            .ok_or_else(|| Error::InvalidKey("public key carries no identity".into()))?;

        Ok(Self::new(identity, public_key, private_key, passphrase, false))
    }

    pub(crate) fn new(
        identity: UserIdentity,
        public_key: &str,
        private_key: &str,
        passphrase: &str,
        verified: bool,
    ) -> Self {
        Self {
            identity,
            public_key: public_key.to_string(),
            private_key: Zeroizing::new(private_key.to_string()),
            passphrase: Zeroizing::new(passphrase.to_string()),
            verified,
        }
    }

    /// Who this session belongs to
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Armored public key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Armored private key
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Private key passphrase
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Whether the session was issued by a successful login
    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_keyless_input() {
        let err = Session::open("not a key", "not a key", "pw").unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let session = Session::new(
            UserIdentity::new("Bob", "bob@example.com"),
            "PUBLIC",
            "PRIVATE-KEY-MATERIAL",
            "hunter2",
            false,
        );
        let printed = format!("{:?}", session);

        assert!(printed.contains("Bob"));
        assert!(!printed.contains("PRIVATE-KEY-MATERIAL"));
        assert!(!printed.contains("hunter2"));
        assert!(!session.is_verified());
    }
}
