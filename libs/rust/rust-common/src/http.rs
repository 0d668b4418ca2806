//! Centralized HTTP client configuration and building.
//!
//! This module provides a standardized way to create HTTP clients with
//! consistent configuration across the platform crates. Clients talking to
//! internal services (Vault) pin a private trust anchor instead of the
//! public web PKI.

use crate::error::PlatformError;
use reqwest::{Certificate, Client, ClientBuilder};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// PEM file holding the only certificate authority to trust. When unset
    /// the built-in web roots are used.
    pub root_certificate: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("recipe-platform-rust/", env!("CARGO_PKG_VERSION")).to_string(),
            root_certificate: None,
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config with custom timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Trust only the CA in the given PEM file.
    #[must_use]
    pub fn with_root_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificate = Some(path.into());
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS and the specified configuration.
///
/// # Errors
///
/// Returns [`PlatformError::TrustAnchor`] if the root certificate cannot be
/// read or parsed, and [`PlatformError::Http`] if the client cannot be built.
///
/// # Examples
///
/// ```
/// use rust_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default()
///     .with_timeout(Duration::from_secs(60));
/// let client = build_http_client(&config).expect("Failed to build client");
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, PlatformError> {
    let mut builder = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    if let Some(path) = &config.root_certificate {
        builder = builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(load_root_certificate(path)?);
    }

    builder.build().map_err(PlatformError::Http)
}

fn load_root_certificate(path: &Path) -> Result<Certificate, PlatformError> {
    let pem = std::fs::read(path).map_err(|e| PlatformError::trust_anchor(path, e.to_string()))?;
    if pem.iter().all(u8::is_ascii_whitespace) {
        return Err(PlatformError::trust_anchor(path, "file is empty"));
    }
    Certificate::from_pem(&pem).map_err(|e| PlatformError::trust_anchor(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.root_certificate.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("test-agent")
            .with_root_certificate("/etc/vault/ca.pem");

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.root_certificate, Some(PathBuf::from("/etc/vault/ca.pem")));
    }

    #[test]
    fn test_build_client() {
        let config = HttpConfig::default();
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_build_client_with_private_root() {
        let ca = rcgen::generate_simple_self_signed(vec!["vault.internal".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ca.cert.pem().as_bytes()).unwrap();

        let config = HttpConfig::default().with_root_certificate(file.path());
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_missing_root_certificate() {
        let config = HttpConfig::default().with_root_certificate("/nonexistent/ca.pem");
        let err = build_http_client(&config).unwrap_err();
        assert!(matches!(err, PlatformError::TrustAnchor { .. }));
    }

    #[test]
    fn test_empty_root_certificate() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = HttpConfig::default().with_root_certificate(file.path());
        let err = build_http_client(&config).unwrap_err();
        assert!(err.to_string().contains("file is empty"));
    }
}
