//! Vault HTTP client for the PKI secrets engine.

use crate::{
    config::VaultConfig,
    error::{VaultError, VaultResult},
    provider::{CertificateIssuer, CertificateRecord, IdentityRequest, IssuedCredential},
    secrets::{PkiCertData, PkiIssueRequest, PkiReadData, PkiResponse, VaultErrors},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use rust_common::{HttpConfig, build_http_client};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::OnceLock;
use tracing::{debug, info, instrument, warn};

/// `User-Agent` sent with every Vault request.
pub const USER_AGENT: &str = concat!("vault-pki-client/", env!("CARGO_PKG_VERSION"));

/// Vault client authenticated with a static token.
///
/// Holds no per-request state; one instance is shared by all requests.
pub struct VaultClient {
    config: VaultConfig,
    http: OnceLock<Client>,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// Neither the configuration nor the trust anchor is checked here so a
    /// process can start with an incomplete setup. Every operation validates
    /// the configuration first, and the HTTP client is built on first use.
    #[must_use]
    pub const fn new(config: VaultConfig) -> Self {
        Self {
            config,
            http: OnceLock::new(),
        }
    }

    /// HTTP client pinned to the configured trust anchor.
    ///
    /// A failed build is not cached, so fixing the CA file takes effect on the
    /// next request.
    fn http(&self) -> VaultResult<&Client> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }

        let mut http_config = HttpConfig::default()
            .with_timeout(self.config.timeout)
            .with_connect_timeout(self.config.connect_timeout)
            .with_user_agent(USER_AGENT);
        if let Some(ca) = &self.config.ca_cert {
            http_config = http_config.with_root_certificate(ca);
        }

        let client = build_http_client(&http_config).inspect_err(|e| {
            warn!(error = %e, "Failed to build Vault HTTP client");
        })?;
        Ok(self.http.get_or_init(|| client))
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> VaultResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.config.validate()?;

        let url = format!("{}/v1/{}", self.config.base_url(), path);
        let mut request = self
            .http()?
            .request(method, &url)
            .header("X-Vault-Token", self.config.token.expose_secret());

        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                VaultError::Timeout(self.config.timeout)
            } else {
                VaultError::unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = VaultErrors::parse(&text);
            warn!(path, status = status.as_u16(), detail = %detail, "Vault request failed");
            return Err(match status {
                StatusCode::BAD_REQUEST => VaultError::InvalidRequest(detail),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    VaultError::PermissionDenied(format!("{path}: {detail}"))
                }
                StatusCode::NOT_FOUND => VaultError::not_found(path),
                StatusCode::TOO_MANY_REQUESTS => VaultError::RateLimited,
                _ => VaultError::unavailable(format!("Status {status}: {detail}")),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                VaultError::Timeout(self.config.timeout)
            } else {
                VaultError::unavailable(e.to_string())
            }
        })?;
        serde_json::from_slice(&bytes).map_err(VaultError::from)
    }
}

#[async_trait]
impl CertificateIssuer for VaultClient {
    #[instrument(skip(self, request), fields(common_name = %request.common_name, role = %request.role))]
    async fn issue_certificate(&self, request: &IdentityRequest) -> VaultResult<IssuedCredential> {
        let path = format!("{}/issue/{}", self.config.pki_mount, request.role);
        let body = PkiIssueRequest {
            common_name: request.common_name.clone(),
            alt_names: request.joined_alt_names(),
            ip_sans: request.joined_ip_sans(),
            ttl: request.ttl.map(|ttl| format!("{}s", ttl.as_secs())),
            format: "pem",
        };

        debug!(path = %path, "Requesting certificate");
        let response: PkiResponse<PkiCertData> =
            self.request(Method::POST, &path, Some(&body)).await?;

        for warning in response.warnings.iter().flatten() {
            warn!(warning = %warning, "Vault returned a warning");
        }

        let data = response.data;
        require_field("certificate", &data.certificate)?;
        require_field("private key", &data.private_key)?;
        require_field("issuing CA", &data.issuing_ca)?;
        require_field("serial number", &data.serial_number)?;
        info!(
            serial_number = %data.serial_number,
            key_type = %data.private_key_type,
            "Certificate issued"
        );

        Ok(IssuedCredential {
            certificate: data.certificate,
            private_key: SecretString::from(data.private_key),
            issuing_ca: data.issuing_ca,
            serial_number: data.serial_number,
            expiration: data.expiration.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
    }

    #[instrument(skip(self))]
    async fn read_certificate(&self, serial_number: &str) -> VaultResult<CertificateRecord> {
        let path = format!("{}/cert/{}", self.config.pki_mount, serial_number);
        let response: PkiResponse<PkiReadData> =
            self.request::<(), _>(Method::GET, &path, None).await?;

        Ok(CertificateRecord {
            serial_number: serial_number.to_string(),
            certificate: response.data.certificate,
            revoked_at: response
                .data
                .revocation_time
                .filter(|ts| *ts > 0)
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
    }
}

fn require_field(name: &'static str, value: &str) -> VaultResult<()> {
    if value.trim().is_empty() {
        warn!(field = name, "Vault issued an incomplete credential");
        return Err(VaultError::IncompleteResponse(name));
    }
    Ok(())
}
