pub mod audit;
pub mod auth;
pub mod backup;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod service;
pub mod vault;
