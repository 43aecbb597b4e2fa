//! AES-256-GCM authenticated encryption for backup archives.
//!
//! `encrypt` picks a fresh random 12-byte nonce per call and prepends
//! it to the ciphertext, so an archive is self-contained:
//!
//! ```text
//! [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//! ```
//!
//! `decrypt` splits the nonce back off before decrypting. Any AEAD
//! failure (wrong key, truncated or tampered ciphertext) surfaces as
//! `CorruptBackup` with no further detail.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns nonce || ciphertext as a single buffer.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt a buffer produced by `encrypt`.
///
/// The first 12 bytes must be the nonce.
pub fn decrypt(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(VaultError::CorruptBackup);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::CorruptBackup)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::CorruptBackup)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x24u8; 32];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let sealed = encrypt(&KEY, b"vault contents").unwrap();
        let plain = decrypt(&KEY, &sealed).unwrap();
        assert_eq!(plain, b"vault contents");
    }

    #[test]
    fn nonces_are_unique_per_call() {
        let a = encrypt(&KEY, b"same input").unwrap();
        let b = encrypt(&KEY, b"same input").unwrap();
        assert_ne!(a, b, "two encryptions must not share a nonce");
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let sealed = encrypt(&KEY, b"secret").unwrap();
        let wrong = [0x25u8; 32];
        assert!(matches!(
            decrypt(&wrong, &sealed),
            Err(VaultError::CorruptBackup)
        ));
    }

    #[test]
    fn decrypt_tampered_ciphertext_fails() {
        let mut sealed = encrypt(&KEY, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            decrypt(&KEY, &sealed),
            Err(VaultError::CorruptBackup)
        ));
    }

    #[test]
    fn decrypt_truncated_input_fails() {
        assert!(matches!(
            decrypt(&KEY, &[0u8; 5]),
            Err(VaultError::CorruptBackup)
        ));
    }
}
