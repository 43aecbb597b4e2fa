//! Credential store — one salt/verifier record per username.
//!
//! Records live in a single JSON file keyed by lowercase username.
//! The store never hands out a verifier through its public surface;
//! only the session authenticator reads it, crate-internally.
//!
//! Writes go through a temp-file + rename so a crash mid-write never
//! leaves a truncated store, and the whole map sits behind a mutex so
//! concurrent registrations cannot interleave read-modify-write.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

/// A registered user's salt and password-derived verifier.
///
/// Immutable after registration — there is no password-change path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Opaque salt the client uses to derive its verifier.
    pub salt: String,

    /// Opaque password-derived verifier, compared at login.
    pub verifier: String,
}

/// JSON-file-backed credential store.
pub struct CredentialStore {
    path: PathBuf,
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl CredentialStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file is an empty store, not an error.
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let data = fs::read(path)?;
            serde_json::from_slice(&data)
                .map_err(|e| VaultError::Serialization(format!("credential store: {e}")))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    /// Register a new user.
    ///
    /// `username` must already be normalized to lowercase by the caller.
    /// Fails with `AlreadyExists` if the username is taken, otherwise
    /// persists the record durably before returning.
    pub fn register(&self, username: &str, salt: &str, verifier: &str) -> Result<()> {
        let mut records = self.records.lock().expect("credential store lock poisoned");

        if records.contains_key(username) {
            return Err(VaultError::AlreadyExists(username.to_string()));
        }

        records.insert(
            username.to_string(),
            CredentialRecord {
                salt: salt.to_string(),
                verifier: verifier.to_string(),
            },
        );

        self.persist(&records)
    }

    /// Return the salt stored for `username`.
    ///
    /// This is the only credential detail exposed pre-authentication;
    /// the verifier never leaves the store.
    pub fn salt(&self, username: &str) -> Result<String> {
        let records = self.records.lock().expect("credential store lock poisoned");
        records
            .get(username)
            .map(|r| r.salt.clone())
            .ok_or_else(|| VaultError::NotFound(format!("user '{username}'")))
    }

    /// Return the verifier for `username`, if registered.
    ///
    /// Crate-internal: only the session authenticator may compare
    /// verifiers, and it must do so in constant time.
    pub(crate) fn verifier(&self, username: &str) -> Option<String> {
        let records = self.records.lock().expect("credential store lock poisoned");
        records.get(username).map(|r| r.verifier.clone())
    }

    /// Write the record map to disk atomically (temp file + rename).
    fn persist(&self, records: &HashMap<String, CredentialRecord>) -> Result<()> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| VaultError::Serialization(format!("credential store: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&dir.path().join("auth_db.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn register_and_fetch_salt() {
        let (_dir, store) = store();
        store.register("alice", "s1", "v1").unwrap();
        assert_eq!(store.salt("alice").unwrap(), "s1");
    }

    #[test]
    fn duplicate_registration_fails() {
        let (_dir, store) = store();
        store.register("alice", "s1", "v1").unwrap();
        assert!(matches!(
            store.register("alice", "s2", "v2"),
            Err(VaultError::AlreadyExists(_))
        ));

        // The original record is untouched.
        assert_eq!(store.salt("alice").unwrap(), "s1");
    }

    #[test]
    fn salt_for_unknown_user_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.salt("ghost"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth_db.json");

        {
            let store = CredentialStore::open(&path).unwrap();
            store.register("alice", "s1", "v1").unwrap();
        }

        let store = CredentialStore::open(&path).unwrap();
        assert_eq!(store.salt("alice").unwrap(), "s1");
        assert_eq!(store.verifier("alice").as_deref(), Some("v1"));
    }
}
