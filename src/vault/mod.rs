//! Vault blob storage — one opaque JSON document per user.

pub mod store;

pub use store::VaultStore;
