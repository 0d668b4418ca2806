//! Wire types for the Vault PKI secrets engine.

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/{mount}/issue/{role}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PkiIssueRequest {
    /// Identity to certify; becomes the certificate CN
    pub common_name: String,
    /// Comma separated DNS subject alternative names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_names: Option<String>,
    /// Comma separated IP subject alternative names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_sans: Option<String>,
    /// Requested lifetime such as `300s`; the role default applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    /// Encoding of the returned material
    pub format: &'static str,
}

/// Response envelope shared by the PKI endpoints.
#[derive(Debug, Deserialize)]
pub struct PkiResponse<T> {
    /// Endpoint specific payload
    pub data: T,
    /// Lease identifier, empty for PKI issuance
    #[serde(default)]
    pub lease_id: String,
    /// Lease duration in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Non-fatal warnings
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// `data` of an issue response.
#[derive(Debug, Deserialize)]
pub struct PkiCertData {
    /// Leaf certificate, PEM
    pub certificate: String,
    /// Certificate of the issuing CA, PEM
    pub issuing_ca: String,
    /// Full chain up to the root
    #[serde(default)]
    pub ca_chain: Vec<String>,
    /// Private key of the leaf, PEM
    pub private_key: String,
    /// Key algorithm, e.g. `rsa`
    #[serde(default)]
    pub private_key_type: String,
    /// Colon separated hex serial
    pub serial_number: String,
    /// Expiry as Unix seconds
    #[serde(default)]
    pub expiration: Option<i64>,
}

/// `data` of a read-certificate response.
#[derive(Debug, Deserialize)]
pub struct PkiReadData {
    /// Certificate, PEM
    pub certificate: String,
    /// Revocation time as Unix seconds; 0 when not revoked
    #[serde(default)]
    pub revocation_time: Option<i64>,
}

/// Error body Vault returns with non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub struct VaultErrors {
    /// Messages, in the order Vault reported them
    #[serde(default)]
    pub errors: Vec<String>,
}

impl VaultErrors {
    /// Parse an error body, tolerating non-JSON bodies from proxies.
    #[must_use]
    pub fn parse(body: &str) -> String {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|e| !e.errors.is_empty())
            .map_or_else(|| body.trim().to_string(), |e| e.errors.join("; "))
    }
}
