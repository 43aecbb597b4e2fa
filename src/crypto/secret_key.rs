//! The backup secret key.
//!
//! A single 32-byte random key encrypts every backup archive the
//! service produces. It lives in a key file next to the service data,
//! generated once on first use and reused for the process lifetime.
//!
//! First-run generation uses an exclusive create (`create_new`) so two
//! callers racing on a fresh deployment cannot persist divergent keys:
//! the loser of the race re-reads the winner's file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::TryRngCore;
use zeroize::Zeroize;

use crate::errors::{Result, VaultError};

/// Length of the secret key in bytes (256 bits).
const KEY_LEN: usize = 32;

/// A 32-byte symmetric key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    /// Load the key from `path`, generating and persisting a new one
    /// if the file does not exist yet.
    ///
    /// Generation writes with `create_new` for exclusive access; if
    /// another process won the race, the freshly created file is read
    /// back instead so both ends hold the same key.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    VaultError::KeyFile(format!("cannot create key directory: {e}"))
                })?;
            }
        }

        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| VaultError::KeyFile(format!("random generator failure: {e}")))?;

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(&bytes)
                    .map_err(|e| VaultError::KeyFile(format!("failed to write key file: {e}")))?;

                // Owner-only read/write on Unix.
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = fs::Permissions::from_mode(0o600);
                    fs::set_permissions(path, perms).map_err(|e| {
                        VaultError::KeyFile(format!("failed to set key file permissions: {e}"))
                    })?;
                }

                Ok(Self { bytes })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bytes.zeroize();
                Self::load(path)
            }
            Err(e) => {
                bytes.zeroize();
                Err(VaultError::KeyFile(format!(
                    "failed to create key file: {e}"
                )))
            }
        }
    }

    /// Read an existing key file and validate its length.
    fn load(path: &Path) -> Result<Self> {
        let mut data = fs::read(path)
            .map_err(|e| VaultError::KeyFile(format!("failed to read key file: {e}")))?;

        if data.len() != KEY_LEN {
            data.zeroize();
            return Err(VaultError::KeyFile(format!(
                "key file must be exactly {KEY_LEN} bytes"
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&data);
        data.zeroize();
        Ok(Self { bytes })
    }

    /// Access the raw key bytes (e.g. to pass to the cipher).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_key_on_first_use() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");

        let key = SecretKey::load_or_generate(&path).unwrap();
        assert!(path.exists());
        assert_eq!(key.as_bytes().len(), KEY_LEN);
    }

    #[test]
    fn loads_same_key_on_second_use() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");

        let first = SecretKey::load_or_generate(&path).unwrap();
        let second = SecretKey::load_or_generate(&path).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn rejects_wrong_length_key_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        fs::write(&path, [0u8; 16]).unwrap();

        assert!(SecretKey::load_or_generate(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.key");
        let _key = SecretKey::load_or_generate(&path).unwrap();

        let perms = fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
