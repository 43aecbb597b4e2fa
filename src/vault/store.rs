//! Per-user vault blob store.
//!
//! Each user owns exactly one JSON file, `<data_dir>/<username>.json`,
//! holding their client-encrypted vault document. Every store is a
//! full overwrite through a temp-file + rename, and all reads and
//! writes for one user are serialized by a per-username lock so a
//! backup snapshot can never observe a half-written file.
//!
//! The backup manager bypasses the blob API and copies the raw on-disk
//! bytes via `raw_snapshot` / `replace_raw`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::errors::{Result, VaultError};

/// File-backed vault blob store.
pub struct VaultStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VaultStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Load a user's vault blob.
    ///
    /// A user with no stored blob gets an empty object, matching what
    /// a fresh client expects on first sync.
    pub fn load(&self, username: &str) -> Result<Value> {
        let lock = self.lock_for(username);
        let _guard = lock.lock().expect("vault lock poisoned");
        let path = self.blob_path(username);

        if !path.exists() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        let data = fs::read(&path)?;
        serde_json::from_slice(&data)
            .map_err(|e| VaultError::Serialization(format!("vault blob for '{username}': {e}")))
    }

    /// Overwrite a user's vault blob with `content`.
    pub fn store(&self, username: &str, content: &Value) -> Result<()> {
        let lock = self.lock_for(username);
        let _guard = lock.lock().expect("vault lock poisoned");
        let data = serde_json::to_vec(content)
            .map_err(|e| VaultError::Serialization(format!("vault blob for '{username}': {e}")))?;
        self.write_atomic(username, &data)
    }

    /// Whether the user has any persisted vault data.
    pub fn has_data(&self, username: &str) -> bool {
        self.blob_path(username).exists()
    }

    /// Snapshot the raw on-disk bytes of a user's vault file.
    ///
    /// Used by the backup manager for bulk copy. Fails with `NotFound`
    /// if the user has never stored a blob.
    pub fn raw_snapshot(&self, username: &str) -> Result<Vec<u8>> {
        let lock = self.lock_for(username);
        let _guard = lock.lock().expect("vault lock poisoned");
        let path = self.blob_path(username);

        if !path.exists() {
            return Err(VaultError::NotFound(format!("vault data for '{username}'")));
        }

        Ok(fs::read(&path)?)
    }

    /// Replace a user's vault file with raw bytes from a restored
    /// backup.
    ///
    /// The bytes must parse as JSON; malformed content is rejected as
    /// `CorruptBackup` before anything touches disk, so a failed
    /// restore leaves the current blob intact.
    pub fn replace_raw(&self, username: &str, bytes: &[u8]) -> Result<()> {
        if serde_json::from_slice::<Value>(bytes).is_err() {
            return Err(VaultError::CorruptBackup);
        }

        let lock = self.lock_for(username);
        let _guard = lock.lock().expect("vault lock poisoned");
        self.write_atomic(username, bytes)
    }

    fn blob_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.json"))
    }

    /// Temp-file + rename in the same directory, so readers never see
    /// a half-written blob.
    fn write_atomic(&self, username: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(username);
        let tmp_path = self.dir.join(format!(".{username}.json.tmp"));

        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn lock_for(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("vault lock table poisoned");
        locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
