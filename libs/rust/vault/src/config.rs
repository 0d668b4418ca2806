//! Vault client configuration.

use crate::error::{VaultError, VaultResult};
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address, e.g. `https://vault.internal:8200`
    pub addr: String,
    /// Bearer token sent as `X-Vault-Token`
    pub token: SecretString,
    /// CA certificate used to verify Vault's own TLS endpoint
    pub ca_cert: Option<PathBuf>,
    /// Mount point of the PKI secrets engine
    pub pki_mount: String,
    /// Request timeout
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            token: SecretString::from(String::new()),
            ca_cert: None,
            pki_mount: "pki_int".to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: SecretString::from(token.into()),
            ..Default::default()
        }
    }

    /// Set the CA certificate that signs Vault's listener certificate.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Set the PKI mount point.
    #[must_use]
    pub fn with_pki_mount(mut self, mount: impl Into<String>) -> Self {
        self.pki_mount = mount.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check that everything needed to reach Vault is present.
    ///
    /// Runs without any I/O so callers can fail before a network call.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] naming the first missing or
    /// malformed setting.
    pub fn validate(&self) -> VaultResult<()> {
        if self.addr.trim().is_empty() {
            return Err(VaultError::invalid_config("Vault address is not set"));
        }
        let url = Url::parse(&self.addr)
            .map_err(|e| VaultError::invalid_config(format!("Vault address is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VaultError::invalid_config(format!(
                "Vault address has unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if self.token.expose_secret().trim().is_empty() {
            return Err(VaultError::invalid_config("Vault token is not set"));
        }
        if self.ca_cert.is_none() {
            return Err(VaultError::invalid_config("Vault CA certificate is not set"));
        }
        if self.pki_mount.trim().is_empty() {
            return Err(VaultError::invalid_config("PKI mount is not set"));
        }
        if self.timeout.is_zero() {
            return Err(VaultError::invalid_config("Vault timeout must be greater than 0"));
        }
        Ok(())
    }

    /// Address without a trailing slash, ready for path concatenation.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.addr.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> VaultConfig {
        VaultConfig::new("https://vault.internal:8200", "s.token").with_ca_cert("/etc/vault/ca.pem")
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.pki_mount, "pki_int");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_complete_config_is_valid() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_missing_addr() {
        let config = VaultConfig { addr: String::new(), ..complete() };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: Vault address is not set");
    }

    #[test]
    fn test_bad_scheme() {
        let config = VaultConfig { addr: "ftp://vault".to_string(), ..complete() };
        assert!(matches!(config.validate(), Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_token() {
        let config = VaultConfig { token: SecretString::from("  ".to_string()), ..complete() };
        assert!(config.validate().unwrap_err().to_string().contains("token"));
    }

    #[test]
    fn test_missing_ca_cert() {
        let config = VaultConfig { ca_cert: None, ..complete() };
        assert!(config.validate().unwrap_err().to_string().contains("CA certificate"));
    }

    #[test]
    fn test_base_url_trims_slash() {
        let config = VaultConfig::new("http://127.0.0.1:8200/", "t");
        assert_eq!(config.base_url(), "http://127.0.0.1:8200");
    }

    #[test]
    fn test_token_not_in_debug() {
        let config = VaultConfig::new("http://127.0.0.1:8200", "hvs.super-secret");
        assert!(!format!("{config:?}").contains("hvs.super-secret"));
    }
}
