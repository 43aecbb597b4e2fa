use thiserror::Error;

/// All errors that can occur in VaultKeep.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Registration / credential errors ---
    #[error("User '{0}' already exists")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // --- Auth errors ---
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid username")]
    InvalidUsername,

    // --- Backup errors ---
    #[error("Invalid backup filename")]
    InvalidFilename,

    #[error("Backup is not owned by the requesting user")]
    OwnershipMismatch,

    #[error("Backup is corrupted or was encrypted with a different key")]
    CorruptBackup,

    #[error("No vault data to back up")]
    NoDataToBackup,

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key file error: {0}")]
    KeyFile(String),

    #[error("Random number generator failure: {0}")]
    Rng(String),

    // --- Storage errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Audit error: {0}")]
    Audit(String),

    #[error("Config file error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Message safe to return to a client.
    ///
    /// Auth failures collapse to a single string so a caller cannot tell
    /// "unknown user" from "wrong verifier", and internal errors never
    /// leak paths or storage detail.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "user exists",
            Self::NotFound(_) => "not found",
            Self::InvalidCredentials | Self::Unauthorized => "unauthorized",
            Self::InvalidUsername => "invalid username",
            Self::InvalidFilename => "invalid filename",
            Self::OwnershipMismatch => "backup not owned by user",
            Self::CorruptBackup => "invalid key or corrupted backup",
            Self::NoDataToBackup => "no data to backup",
            _ => "internal error",
        }
    }
}

/// Convenience type alias for VaultKeep results.
pub type Result<T> = std::result::Result<T, VaultError>;
