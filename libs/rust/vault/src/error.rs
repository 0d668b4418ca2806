//! Vault error types using thiserror 2.0.
//!
//! Every error carries a coarse [`ErrorKind`] so callers can react to
//! configuration, authorization and connectivity failures without
//! inspecting messages.

use rust_common::PlatformError;
use std::time::Duration;
use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Invalid or incomplete configuration, detected before any request
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Vault refused the token or the token's policy denies the path
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Vault rejected the request, e.g. a common name the role does not allow
    #[error("Request rejected: {0}")]
    InvalidRequest(String),

    /// Mount, role or certificate does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vault server unavailable
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Request did not complete in time
    #[error("Vault request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Vault answered successfully but left a required field empty
    #[error("Vault returned an empty {0}")]
    IncompleteResponse(&'static str),

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Address, token, trust anchor, mount or role is missing or wrong
    Configuration,
    /// Vault declined to certify the requested identity
    Authorization,
    /// Vault could not be reached or answered unexpectedly
    Connectivity,
}

impl VaultError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::NotFound(_)
            | Self::Platform(PlatformError::TrustAnchor { .. }) => ErrorKind::Configuration,
            Self::PermissionDenied(_) | Self::InvalidRequest(_) => ErrorKind::Authorization,
            Self::Unavailable(_)
            | Self::Timeout(_)
            | Self::RateLimited
            | Self::IncompleteResponse(_)
            | Self::Serialization(_)
            | Self::Http(_)
            | Self::Platform(_) => ErrorKind::Connectivity,
        }
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::RateLimited | Self::Http(_)
        )
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }
}
