//! Cryptographic primitives for VaultKeep.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - The process-wide backup secret key with load-or-generate
//!   semantics (`secret_key`)

pub mod encryption;
pub mod secret_key;

pub use encryption::{decrypt, encrypt};
pub use secret_key::SecretKey;
