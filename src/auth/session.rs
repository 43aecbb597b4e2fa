//! Session authenticator — login checks and bearer tokens.
//!
//! A successful login mints a 32-byte random token (base64url) bound
//! to the username in an in-memory table. Tokens are opaque,
//! non-expiring identifiers; they vanish on process restart.
//!
//! Verifier comparison is constant-time, and an unknown username
//! produces the exact same error as a wrong verifier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::TryRngCore;
use subtle::ConstantTimeEq;

use crate::auth::credentials::CredentialStore;
use crate::errors::{Result, VaultError};

/// Number of random bytes in a session token (before encoding).
const TOKEN_LEN: usize = 32;

/// Issues and validates session tokens against the credential store.
pub struct SessionAuthenticator {
    credentials: Arc<CredentialStore>,
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionAuthenticator {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            credentials,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Verify a login attempt and mint a fresh session token.
    ///
    /// `username` must already be normalized to lowercase. Fails with
    /// `InvalidCredentials` whether the user is unknown or the verifier
    /// is wrong — the two cases are indistinguishable to the caller.
    pub fn login(&self, username: &str, verifier: &str) -> Result<String> {
        let accepted = match self.credentials.verifier(username) {
            Some(stored) => bool::from(stored.as_bytes().ct_eq(verifier.as_bytes())),
            None => false,
        };

        if !accepted {
            return Err(VaultError::InvalidCredentials);
        }

        let token = Self::mint_token()?;
        let mut sessions = self.sessions.lock().expect("session table lock poisoned");
        sessions.insert(token.clone(), username.to_string());
        Ok(token)
    }

    /// Resolve a bearer token to its bound username.
    ///
    /// Absent, malformed, or unknown tokens all fail with
    /// `Unauthorized`. Every data-touching operation must call this
    /// before doing anything else.
    pub fn authenticate(&self, token: &str) -> Result<String> {
        if token.is_empty() {
            return Err(VaultError::Unauthorized);
        }

        let sessions = self.sessions.lock().expect("session table lock poisoned");
        sessions
            .get(token)
            .cloned()
            .ok_or(VaultError::Unauthorized)
    }

    fn mint_token() -> Result<String> {
        let mut bytes = [0u8; TOKEN_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| VaultError::Rng(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn authenticator() -> (TempDir, SessionAuthenticator) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&dir.path().join("auth_db.json")).unwrap();
        store.register("alice", "s1", "v1").unwrap();
        (dir, SessionAuthenticator::new(Arc::new(store)))
    }

    #[test]
    fn login_with_correct_verifier_mints_token() {
        let (_dir, auth) = authenticator();
        let token = auth.login("alice", "v1").unwrap();
        assert!(!token.is_empty());
        assert_eq!(auth.authenticate(&token).unwrap(), "alice");
    }

    #[test]
    fn wrong_verifier_and_unknown_user_look_identical() {
        let (_dir, auth) = authenticator();

        let wrong = auth.login("alice", "v2").unwrap_err();
        let unknown = auth.login("mallory", "v1").unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, VaultError::InvalidCredentials));
        assert!(matches!(unknown, VaultError::InvalidCredentials));
    }

    #[test]
    fn minted_tokens_are_full_entropy_base64url() {
        let (_dir, auth) = authenticator();
        let token = auth.login("alice", "v1").unwrap();

        // 32 random bytes encode to 43 base64url chars, no padding.
        assert_eq!(token.len(), 43);
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn each_login_mints_a_distinct_token() {
        let (_dir, auth) = authenticator();
        let t1 = auth.login("alice", "v1").unwrap();
        let t2 = auth.login("alice", "v1").unwrap();
        assert_ne!(t1, t2);

        // Both tokens stay valid.
        assert_eq!(auth.authenticate(&t1).unwrap(), "alice");
        assert_eq!(auth.authenticate(&t2).unwrap(), "alice");
    }

    #[test]
    fn unknown_or_empty_token_is_unauthorized() {
        let (_dir, auth) = authenticator();
        assert!(matches!(
            auth.authenticate("no-such-token"),
            Err(VaultError::Unauthorized)
        ));
        assert!(matches!(
            auth.authenticate(""),
            Err(VaultError::Unauthorized)
        ));
    }
}
