//! HashiCorp Vault PKI client.
//!
//! Requests short-lived X.509 client certificates from a Vault PKI secrets
//! engine. Nothing issued here is cached: every call mints a fresh
//! certificate and the caller owns it for the lifetime of one request.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod secrets;

pub use client::VaultClient;
pub use config::VaultConfig;
pub use error::{ErrorKind, VaultError, VaultResult};
pub use provider::{CertificateIssuer, CertificateRecord, IdentityRequest, IssuedCredential};
