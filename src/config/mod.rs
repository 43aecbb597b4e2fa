//! Service configuration, loaded from `vaultkeep.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VaultError};

/// Service-level configuration.
///
/// Every field has a sensible default so the service runs out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding per-user vault blobs, the credential store and
    /// the audit database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory holding encrypted backup archives.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// Name of the backup secret key file, relative to `data_dir`.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// Name of the credential store file, relative to `data_dir`.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_key_file() -> String {
    "secret.key".to_string()
}

fn default_credentials_file() -> String {
    "auth_db.json".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: default_backup_dir(),
            key_file: default_key_file(),
            credentials_file: default_credentials_file(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the service root.
    const FILE_NAME: &'static str = "vaultkeep.toml";

    /// Load settings from `<root>/vaultkeep.toml`.
    ///
    /// If the file does not exist, defaults are returned. If the file
    /// exists but cannot be parsed, an error is returned.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .map_err(|e| VaultError::Config(format!("cannot read {}: {e}", config_path.display())))?;

        toml::from_str(&contents)
            .map_err(|e| VaultError::Config(format!("cannot parse {}: {e}", config_path.display())))
    }

    /// Absolute path of the data directory under `root`.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.data_dir)
    }

    /// Absolute path of the backup directory under `root`.
    pub fn backup_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.backup_dir)
    }

    /// Absolute path of the secret key file under `root`.
    pub fn key_file(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(&self.key_file)
    }

    /// Absolute path of the credential store under `root`.
    pub fn credentials_file(&self, root: &Path) -> PathBuf {
        self.data_dir(root).join(&self.credentials_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_config_file() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.data_dir, "data");
        assert_eq!(settings.backup_dir, "backups");
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("vaultkeep.toml"), "backup_dir = \"archive\"\n").unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.backup_dir, "archive");
        assert_eq!(settings.data_dir, "data");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("vaultkeep.toml"), "backup_dir = [not toml").unwrap();

        assert!(Settings::load(dir.path()).is_err());
    }
}
