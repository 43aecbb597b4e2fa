//! Encrypted per-user backup archives.
//!
//! A backup snapshots the raw on-disk bytes of one user's vault file,
//! seals them with AES-256-GCM under the service's secret key, and
//! writes the ciphertext to `<backup_dir>/backup_{username}_{ts}.enc`
//! where `ts` is the UTC creation time as `YYYYMMDD_HHMMSS`.
//!
//! The `backup_{username}_` filename prefix is the ownership tag:
//! restore and delete verify it against the authenticated username
//! before touching the archive. Filename safety (no `..`, no path
//! separators) is checked before any filesystem access.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::audit::AuditLog;
use crate::crypto::{decrypt, encrypt, SecretKey};
use crate::errors::{Result, VaultError};
use crate::vault::VaultStore;

/// Suffix marking an archive as encrypted.
const ARCHIVE_SUFFIX: &str = ".enc";

/// Timestamp format embedded in archive filenames. Zero-padded, so
/// lexicographic filename order equals chronological order.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Descriptor for one archive, as returned by `list`.
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Creates, lists, restores and deletes a user's encrypted archives.
pub struct BackupManager {
    dir: PathBuf,
    key: SecretKey,
    vault: Arc<VaultStore>,
    audit: Option<Arc<AuditLog>>,
}

impl BackupManager {
    /// Build a manager writing archives under `dir`.
    ///
    /// The secret key is injected rather than loaded here; the service
    /// performs `SecretKey::load_or_generate` once at startup.
    pub fn new(
        dir: &Path,
        key: SecretKey,
        vault: Arc<VaultStore>,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        Self {
            dir: dir.to_path_buf(),
            key,
            vault,
            audit,
        }
    }

    /// Snapshot `username`'s vault into a new encrypted archive and
    /// return its filename.
    ///
    /// Every call produces a distinct archive; two calls within the
    /// same second for the same user collide on the filename and the
    /// last writer wins.
    pub fn create(&self, username: &str) -> Result<String> {
        if !self.vault.has_data(username) {
            return Err(VaultError::NoDataToBackup);
        }

        let plaintext = self.vault.raw_snapshot(username)?;
        let ciphertext = encrypt(self.key.as_bytes(), &plaintext)?;

        fs::create_dir_all(&self.dir)?;

        let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
        let filename = format!("backup_{username}_{timestamp}{ARCHIVE_SUFFIX}");
        fs::write(self.dir.join(&filename), &ciphertext)?;

        self.record(username, "backup_created", &filename);
        Ok(filename)
    }

    /// List all of `username`'s archives, newest first.
    ///
    /// A missing backup directory is an empty list. The creation time
    /// comes from the filename; if that segment doesn't parse, the
    /// file modification time is used instead.
    pub fn list(&self, username: &str) -> Result<Vec<BackupInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = owner_prefix(username);
        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if !name.starts_with(&prefix) || !name.ends_with(ARCHIVE_SUFFIX) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let created_at = parse_archive_timestamp(&name, &prefix)
                .or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
                .unwrap_or_else(Utc::now);

            backups.push(BackupInfo {
                filename: name,
                created_at,
                size: metadata.len(),
            });
        }

        // Zero-padded timestamps make this newest-first.
        backups.sort_by(|a, b| b.filename.cmp(&a.filename));
        Ok(backups)
    }

    /// Decrypt `filename` and overwrite `username`'s vault with its
    /// content.
    ///
    /// Validation order: filename safety, existence, ownership, then
    /// decryption. A failure at any step leaves the current vault
    /// content untouched.
    pub fn restore(&self, filename: &str, username: &str) -> Result<()> {
        let path = self.checked_archive_path(filename, username)?;

        let ciphertext = fs::read(&path)?;
        let plaintext = decrypt(self.key.as_bytes(), &ciphertext)?;

        self.vault.replace_raw(username, &plaintext)?;

        self.record(username, "backup_restored", filename);
        Ok(())
    }

    /// Permanently remove one of `username`'s archives.
    pub fn delete(&self, filename: &str, username: &str) -> Result<()> {
        let path = self.checked_archive_path(filename, username)?;

        fs::remove_file(&path)?;

        self.record(username, "backup_deleted", filename);
        Ok(())
    }

    /// Run the full validation chain and return the archive path.
    fn checked_archive_path(&self, filename: &str, username: &str) -> Result<PathBuf> {
        validate_filename(filename)?;

        let path = self.dir.join(filename);
        if !path.exists() {
            return Err(VaultError::NotFound(format!("backup '{filename}'")));
        }

        if !filename.starts_with(&owner_prefix(username)) {
            return Err(VaultError::OwnershipMismatch);
        }

        Ok(path)
    }

    fn record(&self, username: &str, action: &str, filename: &str) {
        if let Some(audit) = &self.audit {
            audit.record(username, action, Some(filename));
        }
    }
}

/// The ownership prefix every archive of `username` carries.
fn owner_prefix(username: &str) -> String {
    format!("backup_{username}_")
}

/// Reject filenames that could escape the backup directory.
///
/// Must run before any filesystem access.
fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(VaultError::InvalidFilename);
    }
    Ok(())
}

/// Parse the `YYYYMMDD_HHMMSS` segment out of an archive filename.
fn parse_archive_timestamp(filename: &str, prefix: &str) -> Option<DateTime<Utc>> {
    let stem = filename.strip_prefix(prefix)?.strip_suffix(ARCHIVE_SUFFIX)?;
    NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}
