//! Service configuration.
//!
//! Built once at startup from environment variables (optionally seeded from a
//! `.env` file) and shared read-only with every request. Durations are given
//! in whole seconds.

use crate::db::DatabaseConfig;
use std::{env, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::warn;
use vault_pki_client::{IdentityRequest, VaultConfig};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid port number
    #[error("Invalid port for {field}: must be between 1 and 65535")]
    InvalidPort {
        /// Variable name
        field: String,
    },

    /// A timeout of zero seconds
    #[error("Invalid timeout for {field}: must be greater than 0")]
    InvalidTimeout {
        /// Variable name
        field: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub host: String,
    /// Listen port (1-65535)
    pub port: u16,
    /// Vault connection settings; validated per request
    pub vault: VaultConfig,
    /// PKI role used for issuance
    pub pki_role: String,
    /// Common name requested for the client certificate
    pub common_name: String,
    /// Extra DNS names, passed through verbatim
    pub alt_names: Vec<String>,
    /// Extra IP addresses
    pub ip_sans: Vec<IpAddr>,
    /// Requested certificate lifetime; the role default applies when unset
    pub cert_ttl: Option<Duration>,
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Directory receiving the per-request material files
    pub material_dir: PathBuf,
    /// Upper bound on the whole issuance step
    pub issue_timeout: Duration,
    /// How long in-flight requests may drain on shutdown
    pub shutdown_timeout: Duration,
    /// Default log filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is present but malformed.
    /// Missing Vault settings are not an error here.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Env { lookup };

        let addr = vars.string("VAULT_ADDR", "");
        let token = vars.string("VAULT_TOKEN", "");
        let mut vault = VaultConfig::new(addr, token)
            .with_pki_mount(vars.string("PKI_MOUNT", "pki_int"))
            .with_timeout(vars.seconds("VAULT_TIMEOUT", 10)?);
        if let Some(ca) = vars.get("VAULT_CACERT") {
            vault = vault.with_ca_cert(ca);
        }

        let database = DatabaseConfig {
            host: vars.string("DB_HOST", "localhost"),
            port: vars.parse("DB_PORT", 5432)?,
            name: vars.string("DB_NAME", "postgres"),
            user: vars.string("DB_USER", "app_user"),
            connect_timeout: vars.seconds("DB_CONNECT_TIMEOUT", 5)?,
        };

        let config = Self {
            host: vars.string("HOST", "0.0.0.0"),
            port: vars.parse("PORT", 5000)?,
            pki_role: vars.string("PKI_ROLE", "postgres-client"),
            common_name: vars.string("PKI_COMMON_NAME", &database.user),
            alt_names: vars.list("PKI_ALT_NAMES"),
            ip_sans: vars
                .list("PKI_IP_SANS")
                .iter()
                .map(|ip| {
                    ip.parse::<IpAddr>().map_err(|e| ConfigError::ParseError {
                        name: "PKI_IP_SANS".to_string(),
                        reason: format!("{ip}: {e}"),
                    })
                })
                .collect::<Result<_, _>>()?,
            cert_ttl: vars
                .get("PKI_TTL")
                .map(|_| vars.seconds("PKI_TTL", 0))
                .transpose()?,
            material_dir: vars.get("MATERIAL_DIR").map_or_else(env::temp_dir, PathBuf::from),
            issue_timeout: vars.seconds("ISSUE_TIMEOUT", 15)?,
            shutdown_timeout: vars.seconds("SHUTDOWN_TIMEOUT", 30)?,
            log_level: vars.string("LOG_LEVEL", "info"),
            log_json: vars.parse("LOG_JSON", false)?,
            vault,
            database,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                field: "PORT".to_string(),
            });
        }
        if self.database.port == 0 {
            return Err(ConfigError::InvalidPort {
                field: "DB_PORT".to_string(),
            });
        }
        if self.pki_role.trim().is_empty() {
            return Err(ConfigError::MissingRequired("PKI_ROLE".to_string()));
        }
        if self.common_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("PKI_COMMON_NAME".to_string()));
        }
        Ok(())
    }

    /// Log startup warnings for settings that will make every request fail.
    pub fn warn_on_misconfiguration(&self) {
        if let Err(e) = self.vault.validate() {
            warn!(error = %e, "Vault is not fully configured; requests will fail until it is");
        } else if let Some(ca) = self.vault.ca_cert.as_ref().filter(|ca| !ca.is_file()) {
            warn!(
                path = %ca.display(),
                "Vault CA certificate is not readable; requests will fail until it is"
            );
        }
        if self.common_name != self.database.user {
            warn!(
                common_name = %self.common_name,
                db_user = %self.database.user,
                "Certificate common name differs from the database user; the database will reject the login"
            );
        }
    }

    /// Identity requested from Vault for every request.
    #[must_use]
    pub fn identity_request(&self) -> IdentityRequest {
        let request = IdentityRequest::new(&self.common_name, &self.pki_role)
            .with_alt_names(self.alt_names.iter().cloned())
            .with_ip_sans(self.ip_sans.iter().copied());
        match self.cert_ttl {
            Some(ttl) => request.with_ttl(ttl),
            None => request,
        }
    }

    /// Socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable with a default value.
    fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn seconds(&self, name: &str, default: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse(name, default)?;
        if secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: name.to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    /// Parse a comma-separated list.
    fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
