//! Transport-agnostic service facade.
//!
//! `VaultService` wires the credential store, session authenticator,
//! vault store, backup manager and audit log together and exposes the
//! operations an HTTP router would map to endpoints.
//!
//! Policy enforced here:
//! - Usernames are normalized to lowercase (and validated at
//!   registration) before they reach any store.
//! - Every data-touching operation authenticates the bearer token
//!   first; `Unauthorized` short-circuits all other validation so an
//!   unauthenticated caller learns nothing about resource existence.
//! - User identity always comes from the token, never from a
//!   client-supplied claim.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::audit::{AuditEntry, AuditLog};
use crate::auth::{CredentialStore, SessionAuthenticator};
use crate::backup::{BackupInfo, BackupManager};
use crate::config::Settings;
use crate::crypto::SecretKey;
use crate::errors::{Result, VaultError};
use crate::vault::VaultStore;

/// Maximum accepted username length.
const MAX_USERNAME_LEN: usize = 64;

/// The assembled vault service.
pub struct VaultService {
    credentials: Arc<CredentialStore>,
    authenticator: SessionAuthenticator,
    vault: Arc<VaultStore>,
    backups: BackupManager,
    audit: Option<Arc<AuditLog>>,
}

impl VaultService {
    /// Open the service rooted at `root`, loading `vaultkeep.toml`
    /// from there if present.
    pub fn open(root: &Path) -> Result<Self> {
        let settings = Settings::load(root)?;
        Self::with_settings(root, &settings)
    }

    /// Open the service with explicit settings.
    ///
    /// Loads (or generates, on first run) the backup secret key and
    /// opens every store. An audit database that cannot be opened
    /// degrades to "no audit logging" rather than failing startup.
    pub fn with_settings(root: &Path, settings: &Settings) -> Result<Self> {
        let data_dir = settings.data_dir(root);
        std::fs::create_dir_all(&data_dir)?;

        let vault = Arc::new(VaultStore::open(&data_dir)?);
        let credentials = Arc::new(CredentialStore::open(&settings.credentials_file(root))?);

        let audit = match AuditLog::open(&data_dir) {
            Some(log) => Some(Arc::new(log)),
            None => {
                tracing::warn!("audit database unavailable, continuing without audit logging");
                None
            }
        };

        let key = SecretKey::load_or_generate(&settings.key_file(root))?;
        let backups = BackupManager::new(
            &settings.backup_dir(root),
            key,
            Arc::clone(&vault),
            audit.clone(),
        );

        Ok(Self {
            credentials: Arc::clone(&credentials),
            authenticator: SessionAuthenticator::new(credentials),
            vault,
            backups,
            audit,
        })
    }

    // ------------------------------------------------------------------
    // Registration and login
    // ------------------------------------------------------------------

    /// Return the salt a client needs to derive its verifier.
    pub fn auth_salt(&self, username: &str) -> Result<String> {
        self.credentials.salt(&username.to_lowercase())
    }

    /// Register a new user with a client-derived salt/verifier pair.
    pub fn register(&self, username: &str, salt: &str, verifier: &str) -> Result<()> {
        let username = username.to_lowercase();
        validate_username(&username)?;

        self.credentials.register(&username, salt, verifier)?;
        self.record(&username, "registered", None);
        Ok(())
    }

    /// Verify a login attempt and return a fresh session token.
    pub fn login(&self, username: &str, verifier: &str) -> Result<String> {
        let username = username.to_lowercase();

        match self.authenticator.login(&username, verifier) {
            Ok(token) => {
                self.record(&username, "login", None);
                Ok(token)
            }
            Err(e) => {
                self.record(&username, "login_failed", None);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Vault blob access
    // ------------------------------------------------------------------

    /// Read the caller's vault blob.
    pub fn vault_get(&self, token: &str) -> Result<Value> {
        let username = self.authenticator.authenticate(token)?;
        let blob = self.vault.load(&username)?;
        self.record(&username, "vault_accessed", None);
        Ok(blob)
    }

    /// Overwrite the caller's vault blob.
    pub fn vault_put(&self, token: &str, blob: &Value) -> Result<()> {
        let username = self.authenticator.authenticate(token)?;
        self.vault.store(&username, blob)?;
        self.record(&username, "vault_updated", None);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    /// List the caller's backup archives, newest first.
    pub fn backups_list(&self, token: &str) -> Result<Vec<BackupInfo>> {
        let username = self.authenticator.authenticate(token)?;
        self.backups.list(&username)
    }

    /// Create a new encrypted backup of the caller's vault.
    pub fn backup_create(&self, token: &str) -> Result<String> {
        let username = self.authenticator.authenticate(token)?;
        self.backups.create(&username)
    }

    /// Restore the caller's vault from one of their archives.
    pub fn backup_restore(&self, token: &str, filename: &str) -> Result<()> {
        let username = self.authenticator.authenticate(token)?;
        self.backups.restore(filename, &username)
    }

    /// Permanently delete one of the caller's archives.
    pub fn backup_delete(&self, token: &str, filename: &str) -> Result<()> {
        let username = self.authenticator.authenticate(token)?;
        self.backups.delete(filename, &username)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Return the caller's own audit trail, newest first.
    ///
    /// Degrades to an empty list when audit storage is unavailable.
    pub fn audit_entries(&self, token: &str) -> Result<Vec<AuditEntry>> {
        let username = self.authenticator.authenticate(token)?;
        Ok(self
            .audit
            .as_ref()
            .map(|log| log.query(&username))
            .unwrap_or_default())
    }

    fn record(&self, username: &str, action: &str, details: Option<&str>) {
        if let Some(audit) = &self.audit {
            audit.record(username, action, details);
        }
    }
}

/// Validate a (already lowercased) username.
///
/// Usernames become file names and archive-name prefixes, so the
/// charset is tight: ASCII lowercase letters, digits, and hyphens.
/// Underscores are excluded because `_` delimits the archive ownership
/// prefix and would make `backup_{username}_` ambiguous across users.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(VaultError::InvalidUsername);
    }
    if !username
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(VaultError::InvalidUsername);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_charset_is_enforced() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("alice-2").is_ok());

        assert!(validate_username("").is_err());
        assert!(validate_username("alice_2").is_err());
        assert!(validate_username("../etc").is_err());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }
}
