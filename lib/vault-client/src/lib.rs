//! vault-client - Rust client for HashiCorp Vault
//!
//! Keeps track of how the session token was obtained and, when an operation
//! fails because that token expired, logs in again with the same method and
//! retries the operation once.
//!
//! Supported login methods:
//! 1. Static token (`VAULT_TOKEN` or [`VaultClient::set_token`])
//! 2. AppRole, from ids or from role-id / secret-id files with a token cache file
//! 3. Kubernetes service account JWT
//! 4. LDAP

pub mod auth;
mod client;
mod connection;
mod encoding;
mod error;
mod kv;
mod models;
mod sys;

pub use auth::AuthMethod;
pub use client::{VaultClient, VaultClientBuilder};
pub use connection::Connection;
pub use encoding::base64_smart_decode;
pub use error::VaultError;
pub use kv::kv2_metadata_path;
pub use models::{Secret, SecretAuth};
