//! Certificate issuer abstraction and the types that cross it.

use crate::error::VaultResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::{net::IpAddr, time::Duration};

/// Identity a caller wants certified.
///
/// Built per request and discarded after issuance. Policy checks on the
/// common name happen in Vault, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRequest {
    /// Common name; the database expects this to equal the login name
    pub common_name: String,
    /// PKI role that signs the certificate
    pub role: String,
    /// Additional DNS subject alternative names
    pub alt_names: Vec<String>,
    /// Additional IP subject alternative names
    pub ip_sans: Vec<IpAddr>,
    /// Requested lifetime; the role's default applies when unset
    pub ttl: Option<Duration>,
}

impl IdentityRequest {
    /// Create a request for `common_name` signed by `role`.
    #[must_use]
    pub fn new(common_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            role: role.into(),
            alt_names: Vec::new(),
            ip_sans: Vec::new(),
            ttl: None,
        }
    }

    /// Add DNS alternative names.
    #[must_use]
    pub fn with_alt_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alt_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add IP alternative names.
    #[must_use]
    pub fn with_ip_sans(mut self, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        self.ip_sans.extend(ips);
        self
    }

    /// Request a specific lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Comma-joined DNS names, `None` when empty.
    #[must_use]
    pub fn joined_alt_names(&self) -> Option<String> {
        (!self.alt_names.is_empty()).then(|| self.alt_names.join(","))
    }

    /// Comma-joined IP names, `None` when empty.
    #[must_use]
    pub fn joined_ip_sans(&self) -> Option<String> {
        (!self.ip_sans.is_empty()).then(|| {
            self.ip_sans
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
    }
}

/// A freshly issued client certificate and its key.
///
/// Owned by exactly one request. The private key is wrapped in a
/// [`SecretString`] so it never shows up in `Debug` output and is zeroed
/// on drop.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Leaf certificate, PEM
    pub certificate: String,
    /// Private key, PEM
    pub private_key: SecretString,
    /// Certificate of the issuing CA, PEM
    pub issuing_ca: String,
    /// Serial number, colon separated hex
    pub serial_number: String,
    /// Expiry reported by Vault
    pub expiration: Option<DateTime<Utc>>,
}

/// A certificate looked up by serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Serial number that was looked up
    pub serial_number: String,
    /// Certificate, PEM
    pub certificate: String,
    /// When the certificate was revoked, if it was
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Source of short-lived client certificates.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Issue a new certificate for `request`.
    async fn issue_certificate(&self, request: &IdentityRequest) -> VaultResult<IssuedCredential>;

    /// Read back a previously issued certificate.
    async fn read_certificate(&self, serial_number: &str) -> VaultResult<CertificateRecord>;
}
