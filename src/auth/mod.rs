//! Authentication — credential records and session tokens.
//!
//! This module provides:
//! - `CredentialStore`, the per-username salt/verifier record store
//!   (`credentials`)
//! - `SessionAuthenticator`, which checks login attempts and issues
//!   bearer tokens (`session`)

pub mod credentials;
pub mod session;

pub use credentials::{CredentialRecord, CredentialStore};
pub use session::SessionAuthenticator;
